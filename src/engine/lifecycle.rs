use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::dispatch::DispatchCoordinator;
use crate::error::AppError;
use crate::models::actor::{Actor, ActorRole};
use crate::models::assignment::DriverAssignment;
use crate::models::coordinate::Address;
use crate::models::events::DispatchEvent;
use crate::models::order::{
    Addresses, Earnings, Order, OrderStatus, PaymentStatus, Pricing, Timeline,
};
use crate::observability::metrics::Metrics;
use crate::store::{OrderRecord, RecordStore};

/// What a transition request did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied {
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    },
    /// The order already had the requested status.
    Unchanged { at: DateTime<Utc> },
}

impl Transition {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Transition::Applied { at, .. } | Transition::Unchanged { at } => *at,
        }
    }
}

/// Moves `order` to `target` if the state machine and the actor's role allow
/// it. Stamps are never earlier than the latest existing stamp.
pub fn apply_transition(
    order: &mut Order,
    target: OrderStatus,
    actor: &Actor,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    let from = order.status;

    if from == target {
        let at = order
            .timeline
            .stamp_for(target)
            .unwrap_or_else(|| order.timeline.latest());
        return Ok(Transition::Unchanged { at });
    }

    // A retried forward step that a later step already overtook.
    if target.precedes(&from)
        && let Some(at) = order.timeline.stamp_for(target)
    {
        return Ok(Transition::Unchanged { at });
    }

    if from.is_terminal() {
        return Err(AppError::IllegalTransition(format!(
            "order {} is {from}; cannot move to {target}",
            order.id
        )));
    }

    let reason = reason.map(str::trim).filter(|r| !r.is_empty());

    if target == OrderStatus::Cancelled {
        authorize_cancel(order, from, actor, reason)?;
    } else {
        if from.next() != Some(target) {
            return Err(AppError::IllegalTransition(format!(
                "order {} cannot move from {from} to {target}",
                order.id
            )));
        }
        if actor.role == ActorRole::Customer {
            return Err(AppError::Forbidden(format!(
                "customers cannot move orders to {target}"
            )));
        }
    }

    let at = order.timeline.stamp(target, now.max(order.timeline.latest()));
    order.status = target;
    if target == OrderStatus::Cancelled {
        order.cancellation_reason = reason.map(str::to_string);
    }

    Ok(Transition::Applied {
        from,
        to: target,
        at,
    })
}

fn authorize_cancel(
    order: &Order,
    from: OrderStatus,
    actor: &Actor,
    reason: Option<&str>,
) -> Result<(), AppError> {
    if from.is_out_for_delivery() {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(format!(
                "order {} is already picked up; only an admin may cancel it",
                order.id
            )));
        }
        if reason.is_none() {
            return Err(AppError::BadRequest(
                "cancelling a picked-up order requires a reason".to_string(),
            ));
        }
        return Ok(());
    }

    match actor.role {
        ActorRole::Customer | ActorRole::Vendor | ActorRole::Admin | ActorRole::System => Ok(()),
        ActorRole::Driver => Err(AppError::Forbidden(
            "drivers cannot cancel orders; decline the assignment instead".to_string(),
        )),
    }
}

/// Input for placing a new order. Amounts in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub pickup: Address,
    pub delivery: Address,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub order: Order,
    pub changed: bool,
    pub stamped_at: DateTime<Utc>,
    /// Assignments closed because the order reached a terminal status.
    pub closed_assignments: Vec<DriverAssignment>,
}

/// Sole writer of order status and timeline. Assignment clean-up on terminal
/// statuses is handed to the dispatch coordinator.
pub struct OrderLifecycle {
    store: Arc<dyn RecordStore>,
    dispatch: Arc<DispatchCoordinator>,
    events: broadcast::Sender<DispatchEvent>,
    metrics: Metrics,
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatch: Arc<DispatchCoordinator>,
        events: broadcast::Sender<DispatchEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            dispatch,
            events,
            metrics,
        }
    }

    pub fn create(
        &self,
        draft: NewOrder,
        pricing: Pricing,
        earnings: Earnings,
    ) -> Result<Order, AppError> {
        if !pricing.is_consistent() {
            return Err(AppError::Internal("order pricing does not add up".to_string()));
        }
        if !earnings.reconciles_with(&pricing) {
            return Err(AppError::Internal(
                "order earnings do not reconcile with pricing".to_string(),
            ));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id: draft.customer_id,
            vendor_id: draft.vendor_id,
            driver_id: None,
            status: OrderStatus::Pending,
            pricing,
            earnings,
            addresses: Addresses {
                pickup: draft.pickup,
                delivery: draft.delivery,
            },
            timeline: Timeline::new(now),
            cancellation_reason: None,
            payment_status: draft.payment_status,
            created_at: now,
        };

        self.store.insert(OrderRecord::new(order.clone()))?;

        info!(
            order_id = %order.id,
            vendor_id = %order.vendor_id,
            total = order.pricing.total,
            "order created"
        );

        Ok(order)
    }

    pub fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: Actor,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, AppError> {
        let mut record = self.store.load(order_id)?;
        let expected_version = record.version;

        let transition = apply_transition(&mut record.order, target, &actor, reason, Utc::now())?;

        let Transition::Applied { from, to, at } = transition else {
            // Re-settle on repeats so a failed clean-up can be retried.
            return self.outcome(record.order, false, transition.at());
        };

        let committed = self
            .store
            .commit(record, expected_version)
            .inspect_err(|err| {
                if err.is_retryable() {
                    self.metrics.dispatch_conflicts_total.inc();
                    warn!(%order_id, target = %to, "transition lost a concurrent update");
                }
            })?;

        self.metrics
            .order_transitions_total
            .with_label_values(&[to.as_str()])
            .inc();

        info!(
            %order_id,
            from = %from,
            to = %to,
            actor_role = ?actor.role,
            actor_id = %actor.id,
            "order transitioned"
        );

        let _ = self.events.send(DispatchEvent::OrderTransitioned {
            order_id,
            from_status: from,
            to_status: to,
            timestamp: at,
        });

        self.outcome(committed.order, true, at)
    }

    fn outcome(
        &self,
        order: Order,
        changed: bool,
        stamped_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppError> {
        let closed_assignments = if order.status.is_terminal() {
            self.dispatch.settle(order.id)?
        } else {
            Vec::new()
        };

        Ok(TransitionOutcome {
            order,
            changed,
            stamped_at,
            closed_assignments,
        })
    }
}
