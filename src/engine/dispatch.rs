use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::distance::DistanceEngine;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::assignment::{AssignmentStatus, DriverAssignment, RankedCandidate};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::events::DispatchEvent;
use crate::models::order::OrderStatus;
use crate::observability::metrics::Metrics;
use crate::store::drivers::DriverRegistry;
use crate::store::{OrderRecord, RecordStore};

const RANKING_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RespondOutcome {
    Accepted {
        assignment: DriverAssignment,
    },
    /// The driver declined and the next-ranked driver now holds the offer.
    Reoffered {
        declined: DriverAssignment,
        offer: DriverAssignment,
    },
}

/// Sole writer of `driver_id` and assignment state on an order record.
pub struct DispatchCoordinator {
    store: Arc<dyn RecordStore>,
    drivers: Arc<DriverRegistry>,
    engine: Arc<DistanceEngine>,
    events: broadcast::Sender<DispatchEvent>,
    metrics: Metrics,
}

impl DispatchCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        drivers: Arc<DriverRegistry>,
        engine: Arc<DistanceEngine>,
        events: broadcast::Sender<DispatchEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            drivers,
            engine,
            events,
            metrics,
        }
    }

    /// Ranks the candidates by distance to pickup and offers the order to the
    /// nearest available one. The rest wait in the record's candidate queue.
    pub async fn assign(
        &self,
        order_id: Uuid,
        candidate_driver_ids: &[Uuid],
    ) -> Result<DriverAssignment, AppError> {
        let mut record = self.store.load(order_id)?;
        let expected_version = record.version;
        ensure_dispatchable(&record)?;

        let mut seen = HashSet::new();
        let drivers: Vec<Driver> = candidate_driver_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.drivers.get(*id))
            .filter(|driver| driver.status == DriverStatus::Available)
            .collect();

        record.candidates = self.rank(&record, drivers).await;

        let offer = self
            .offer_next(&mut record)
            .ok_or_else(|| AppError::NoDriverAvailable(order_id.to_string()))?;

        self.commit(record, expected_version)?;
        self.publish(&offer);

        info!(
            %order_id,
            driver_id = %offer.driver_id,
            distance_m = offer.distance_meters,
            "order offered to nearest driver"
        );

        Ok(offer)
    }

    pub async fn respond(
        &self,
        assignment_id: Uuid,
        accept: bool,
    ) -> Result<RespondOutcome, AppError> {
        let order_id = self.store.order_for_assignment(assignment_id)?;
        let record = self.store.load(order_id)?;
        let expected_version = record.version;

        let current = record
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;

        if current.status != AssignmentStatus::Offered {
            return Err(AppError::AssignmentConflict(format!(
                "assignment {assignment_id} is {}, not offered",
                current.status.as_str()
            )));
        }

        if accept {
            self.accept(record, expected_version, assignment_id)
        } else {
            self.decline(record, expected_version, assignment_id)
        }
    }

    /// Admin override: revokes whatever is open and installs `new_driver_id`
    /// as the accepted driver directly.
    pub fn reassign(
        &self,
        order_id: Uuid,
        new_driver_id: Uuid,
        actor: Actor,
    ) -> Result<DriverAssignment, AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "only admins may reassign drivers".to_string(),
            ));
        }

        let driver = self.drivers.require(new_driver_id)?;
        let mut record = self.store.load(order_id)?;
        let expected_version = record.version;

        if record.order.status.is_terminal() {
            return Err(AppError::IllegalTransition(format!(
                "order {order_id} is {}; its driver can no longer change",
                record.order.status
            )));
        }

        if let Some(current) = record.accepted()
            && current.driver_id == new_driver_id
        {
            return Ok(current.clone());
        }

        // Only the accepted driver was occupied by this order; offered drivers
        // may be busy elsewhere and keep whatever status they have.
        let mut revoked = Vec::new();
        for assignment in record.assignments.iter_mut() {
            if assignment.status.is_open() {
                let was_accepted = assignment.status == AssignmentStatus::Accepted;
                assignment.status = AssignmentStatus::Revoked;
                revoked.push((assignment.clone(), was_accepted));
            }
        }

        let assignment = DriverAssignment {
            id: Uuid::new_v4(),
            order_id,
            driver_id: driver.id,
            assigned_at: Utc::now(),
            status: AssignmentStatus::Accepted,
            assigned_by: Some(actor.id),
            distance_meters: None,
        };
        record.assignments.push(assignment.clone());
        record.order.driver_id = Some(driver.id);
        record.candidates.clear();

        self.commit(record, expected_version)?;

        for (previous, was_accepted) in &revoked {
            self.publish(previous);
            if *was_accepted && previous.driver_id != driver.id {
                self.release(previous.driver_id);
            }
        }
        self.publish(&assignment);
        self.occupy(driver.id);

        info!(
            %order_id,
            driver_id = %driver.id,
            admin_id = %actor.id,
            revoked = revoked.len(),
            "order reassigned by admin"
        );

        Ok(assignment)
    }

    /// Closes the accepted assignment once the order is delivered.
    pub fn complete(&self, order_id: Uuid) -> Result<Option<DriverAssignment>, AppError> {
        let status = self.store.load(order_id)?.order.status;
        if status != OrderStatus::Delivered {
            return Err(AppError::IllegalTransition(format!(
                "order {order_id} is {status}; assignments complete on delivery"
            )));
        }

        Ok(self
            .settle(order_id)?
            .into_iter()
            .find(|a| a.status == AssignmentStatus::Completed))
    }

    /// Closes whatever a terminal order still holds open. On delivery the
    /// accepted assignment completes; otherwise open assignments are revoked.
    /// Drivers that had accepted are released. Safe to call repeatedly.
    pub fn settle(&self, order_id: Uuid) -> Result<Vec<DriverAssignment>, AppError> {
        const ATTEMPTS: usize = 3;

        for attempt in 1..=ATTEMPTS {
            let mut record = self.store.load(order_id)?;
            let expected_version = record.version;
            let status = record.order.status;

            if !status.is_terminal() {
                return Ok(Vec::new());
            }

            let mut closed = Vec::new();
            for assignment in record.assignments.iter_mut() {
                if !assignment.status.is_open() {
                    continue;
                }
                let was_accepted = assignment.status == AssignmentStatus::Accepted;
                assignment.status = if was_accepted && status == OrderStatus::Delivered {
                    AssignmentStatus::Completed
                } else {
                    AssignmentStatus::Revoked
                };
                closed.push((assignment.clone(), was_accepted));
            }

            if closed.is_empty() {
                return Ok(Vec::new());
            }
            record.candidates.clear();

            match self.commit(record, expected_version) {
                Ok(_) => {
                    for (assignment, was_accepted) in &closed {
                        self.publish(assignment);
                        if *was_accepted {
                            self.release(assignment.driver_id);
                        }
                    }
                    info!(%order_id, %status, closed = closed.len(), "assignments settled");
                    return Ok(closed.into_iter().map(|(assignment, _)| assignment).collect());
                }
                Err(err) if err.is_retryable() && attempt < ATTEMPTS => {
                    warn!(%order_id, attempt, "retrying assignment settlement");
                }
                Err(err) => return Err(err),
            }
        }

        Err(AppError::AssignmentConflict(format!(
            "order {order_id} kept changing while settling its assignments"
        )))
    }

    pub fn history(&self, order_id: Uuid) -> Result<Vec<DriverAssignment>, AppError> {
        Ok(self.store.load(order_id)?.assignments)
    }

    fn accept(
        &self,
        mut record: OrderRecord,
        expected_version: u64,
        assignment_id: Uuid,
    ) -> Result<RespondOutcome, AppError> {
        let order_id = record.order.id;

        if record.order.status.is_terminal() {
            return Err(AppError::AssignmentConflict(format!(
                "order {order_id} is {} and no longer needs a driver",
                record.order.status
            )));
        }
        if let Some(existing) = record.accepted() {
            return Err(AppError::AssignmentConflict(format!(
                "order {order_id} already has driver {}",
                existing.driver_id
            )));
        }

        let driver_id = record
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .map(|a| a.driver_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;
        let driver = self.drivers.require(driver_id)?;
        if driver.status != DriverStatus::Available {
            return Err(AppError::AssignmentConflict(format!(
                "driver {driver_id} is {:?} and cannot take order {order_id}",
                driver.status
            )));
        }

        let assignment = record
            .assignment_mut(assignment_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;
        assignment.status = AssignmentStatus::Accepted;
        let accepted = assignment.clone();

        record.order.driver_id = Some(accepted.driver_id);
        record.candidates.clear();

        self.commit(record, expected_version)?;
        self.publish(&accepted);
        self.occupy(accepted.driver_id);

        info!(%order_id, driver_id = %accepted.driver_id, "driver accepted order");

        Ok(RespondOutcome::Accepted {
            assignment: accepted,
        })
    }

    fn decline(
        &self,
        mut record: OrderRecord,
        expected_version: u64,
        assignment_id: Uuid,
    ) -> Result<RespondOutcome, AppError> {
        let order_id = record.order.id;

        let assignment = record
            .assignment_mut(assignment_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;
        assignment.status = AssignmentStatus::Declined;
        let declined = assignment.clone();

        let next = if record.order.status.is_terminal() {
            None
        } else {
            self.offer_next(&mut record)
        };

        self.commit(record, expected_version)?;
        self.publish(&declined);

        info!(%order_id, driver_id = %declined.driver_id, "driver declined order");

        match next {
            Some(offer) => {
                self.publish(&offer);
                info!(%order_id, driver_id = %offer.driver_id, "order re-offered");
                Ok(RespondOutcome::Reoffered { declined, offer })
            }
            None => {
                warn!(%order_id, "candidate queue exhausted; escalate to manual assignment");
                Err(AppError::NoDriverAvailable(order_id.to_string()))
            }
        }
    }

    async fn rank(&self, record: &OrderRecord, drivers: Vec<Driver>) -> Vec<RankedCandidate> {
        let pickup = record.order.addresses.pickup.location;

        let mut ranked: Vec<RankedCandidate> = futures::stream::iter(drivers)
            .map(|driver| async move {
                let measured = self.engine.point_to_point(driver.location, pickup).await;
                (driver, measured)
            })
            .buffered(RANKING_CONCURRENCY)
            .filter_map(|(driver, measured)| async move {
                match measured {
                    Ok(result) => Some(RankedCandidate {
                        driver_id: driver.id,
                        distance_meters: result.is_ok().then_some(result.distance_meters),
                    }),
                    Err(err) => {
                        warn!(driver_id = %driver.id, error = %err, "skipping unrankable driver");
                        None
                    }
                }
            })
            .collect()
            .await;

        ranked.sort_by(|a, b| a.rank_key().total_cmp(&b.rank_key()));
        ranked
    }

    /// Pops queued candidates until one is still available and offers to it.
    fn offer_next(&self, record: &mut OrderRecord) -> Option<DriverAssignment> {
        while !record.candidates.is_empty() {
            let candidate = record.candidates.remove(0);

            let available = self
                .drivers
                .get(candidate.driver_id)
                .is_some_and(|driver| driver.status == DriverStatus::Available);
            if !available {
                continue;
            }

            let offer = DriverAssignment {
                id: Uuid::new_v4(),
                order_id: record.order.id,
                driver_id: candidate.driver_id,
                assigned_at: Utc::now(),
                status: AssignmentStatus::Offered,
                assigned_by: None,
                distance_meters: candidate.distance_meters,
            };
            record.assignments.push(offer.clone());
            return Some(offer);
        }
        None
    }

    fn commit(&self, record: OrderRecord, expected_version: u64) -> Result<OrderRecord, AppError> {
        let order_id = record.order.id;
        self.store.commit(record, expected_version).inspect_err(|err| {
            if err.is_retryable() {
                self.metrics.dispatch_conflicts_total.inc();
                warn!(%order_id, "dispatch lost a concurrent update");
            }
        })
    }

    fn publish(&self, assignment: &DriverAssignment) {
        self.metrics
            .assignments_total
            .with_label_values(&[assignment.status.as_str()])
            .inc();

        let _ = self.events.send(DispatchEvent::AssignmentChanged {
            order_id: assignment.order_id,
            driver_id: assignment.driver_id,
            assignment_status: assignment.status,
            timestamp: Utc::now(),
        });
    }

    fn occupy(&self, driver_id: Uuid) {
        if let Err(err) = self.drivers.set_status(driver_id, DriverStatus::Busy) {
            warn!(%driver_id, error = %err, "could not mark driver busy");
        }
    }

    fn release(&self, driver_id: Uuid) {
        if let Err(err) = self.drivers.set_status(driver_id, DriverStatus::Available) {
            warn!(%driver_id, error = %err, "could not release driver");
        }
    }
}

fn ensure_dispatchable(record: &OrderRecord) -> Result<(), AppError> {
    let order = &record.order;
    if order.status.is_terminal() {
        return Err(AppError::IllegalTransition(format!(
            "order {} is {}; nothing to dispatch",
            order.id, order.status
        )));
    }
    if let Some(open) = record.assignments.iter().find(|a| a.status.is_open()) {
        return Err(AppError::AssignmentConflict(format!(
            "order {} already has a {} assignment for driver {}",
            order.id,
            open.status.as_str(),
            open.driver_id
        )));
    }
    Ok(())
}
