use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Offered,
    Accepted,
    Declined,
    Completed,
    Revoked,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Offered => "offered",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::Declined => "declined",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Revoked => "revoked",
        }
    }

    /// Offered or accepted; everything else is history.
    pub fn is_open(&self) -> bool {
        matches!(self, AssignmentStatus::Offered | AssignmentStatus::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
    /// Admin who forced the assignment, if it was an override.
    pub assigned_by: Option<Uuid>,
    /// Driver-to-pickup distance used for ranking, when ranked.
    pub distance_meters: Option<f64>,
}

/// A driver waiting in line for an offer on one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub driver_id: Uuid,
    /// `None` when no road route to the pickup exists.
    pub distance_meters: Option<f64>,
}

impl RankedCandidate {
    pub fn rank_key(&self) -> f64 {
        self.distance_meters.unwrap_or(f64::INFINITY)
    }
}
