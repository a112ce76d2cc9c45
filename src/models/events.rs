use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;
use crate::models::order::OrderStatus;

/// Published to the notification dispatcher. Channel fan-out is its concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    OrderTransitioned {
        order_id: Uuid,
        from_status: OrderStatus,
        to_status: OrderStatus,
        timestamp: DateTime<Utc>,
    },
    AssignmentChanged {
        order_id: Uuid,
        driver_id: Uuid,
        assignment_status: AssignmentStatus,
        timestamp: DateTime<Utc>,
    },
}

impl DispatchEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchEvent::OrderTransitioned { .. } => "order_transitioned",
            DispatchEvent::AssignmentChanged { .. } => "assignment_changed",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            DispatchEvent::OrderTransitioned { order_id, .. }
            | DispatchEvent::AssignmentChanged { order_id, .. } => *order_id,
        }
    }
}
