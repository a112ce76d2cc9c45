//! Record store contract: atomic read-modify-write of one order together with
//! its assignment history, guarded by a version number.

pub mod drivers;
pub mod memory;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DriverAssignment, RankedCandidate};
use crate::models::order::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order: Order,
    /// Append-only audit trail of every offer and assignment.
    pub assignments: Vec<DriverAssignment>,
    /// Drivers still queued for an offer, nearest first.
    pub candidates: Vec<RankedCandidate>,
    pub version: u64,
}

impl OrderRecord {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            assignments: Vec::new(),
            candidates: Vec::new(),
            version: 0,
        }
    }

    pub fn with_status(&self, status: AssignmentStatus) -> impl Iterator<Item = &DriverAssignment> {
        self.assignments.iter().filter(move |a| a.status == status)
    }

    pub fn accepted(&self) -> Option<&DriverAssignment> {
        self.with_status(AssignmentStatus::Accepted).next()
    }

    pub fn assignment_mut(&mut self, assignment_id: Uuid) -> Option<&mut DriverAssignment> {
        self.assignments.iter_mut().find(|a| a.id == assignment_id)
    }
}

pub trait RecordStore: Send + Sync {
    fn insert(&self, record: OrderRecord) -> Result<(), AppError>;

    fn load(&self, order_id: Uuid) -> Result<OrderRecord, AppError>;

    /// Replaces the stored record iff its version still equals
    /// `expected_version`. Returns the record as stored, with its new version.
    fn commit(&self, record: OrderRecord, expected_version: u64) -> Result<OrderRecord, AppError>;

    fn order_for_assignment(&self, assignment_id: Uuid) -> Result<Uuid, AppError>;

    fn list(&self) -> Vec<Order>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Invariants every commit must preserve relative to the stored record.
pub fn check_commit(current: &OrderRecord, next: &OrderRecord) -> Result<(), AppError> {
    let order_id = current.order.id;

    if next.order.id != order_id {
        return Err(AppError::Internal(format!(
            "commit for order {order_id} carries order {}",
            next.order.id
        )));
    }

    if next.order.pricing != current.order.pricing {
        return Err(AppError::Internal(format!(
            "pricing of order {order_id} is immutable"
        )));
    }

    if next.order.created_at != current.order.created_at {
        return Err(AppError::Internal(format!(
            "creation time of order {order_id} is immutable"
        )));
    }

    let statuses = [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedUp,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];
    let timeline_kept = next.order.timeline.ordered == current.order.timeline.ordered
        && statuses.iter().all(|status| {
            match current.order.timeline.stamp_for(*status) {
                Some(stamp) => next.order.timeline.stamp_for(*status) == Some(stamp),
                None => true,
            }
        });
    if !timeline_kept {
        return Err(AppError::Internal(format!(
            "timeline of order {order_id} may only gain stamps"
        )));
    }

    let history_kept = next.assignments.len() >= current.assignments.len()
        && current
            .assignments
            .iter()
            .zip(next.assignments.iter())
            .all(|(old, new)| old.id == new.id && old.driver_id == new.driver_id);
    if !history_kept {
        return Err(AppError::Internal(format!(
            "assignment history of order {order_id} is append-only"
        )));
    }

    let accepted = next.with_status(AssignmentStatus::Accepted).count();
    if accepted > 1 {
        return Err(AppError::Internal(format!(
            "order {order_id} would have {accepted} accepted assignments"
        )));
    }

    Ok(())
}
