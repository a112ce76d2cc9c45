use serde::{Deserialize, Serialize};

use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceStatus {
    Ok,
    NotFound,
    ZeroResults,
}

/// One measured origin/destination pair. Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult {
    pub distance_meters: f64,
    pub duration_seconds: u64,
    pub status: DistanceStatus,
    /// Set when the figure is a great-circle estimate rather than a road route.
    pub fallback: bool,
}

impl DistanceResult {
    pub fn is_ok(&self) -> bool {
        self.status == DistanceStatus::Ok
    }

    /// Ranking key: unroutable pairs sort after every routable one.
    pub fn rank_distance(&self) -> f64 {
        if self.is_ok() {
            self.distance_meters
        } else {
            f64::INFINITY
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1_000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub legs: Vec<DistanceResult>,
    pub polyline: String,
    pub total_distance_meters: f64,
    pub total_duration_seconds: u64,
    pub fallback: bool,
}

impl Route {
    pub fn from_legs(legs: Vec<DistanceResult>, polyline: String) -> Self {
        let total_distance_meters = legs.iter().map(|leg| leg.distance_meters).sum();
        let total_duration_seconds = legs.iter().map(|leg| leg.duration_seconds).sum();
        let fallback = legs.iter().any(|leg| leg.fallback);

        Self {
            legs,
            polyline,
            total_distance_meters,
            total_duration_seconds,
            fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedStop {
    /// Position of the stop in the caller's input list.
    pub index: usize,
    pub location: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    pub stops: Vec<OrderedStop>,
    pub legs: Vec<DistanceResult>,
    pub total_distance_meters: f64,
    pub total_duration_seconds: u64,
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub distance_meters: f64,
    pub duration_seconds: u64,
    /// Fee in currency minor units (two decimals).
    pub fee_cents: i64,
    pub eta_minutes: u64,
    pub within_service_radius: bool,
    pub estimated: bool,
}
