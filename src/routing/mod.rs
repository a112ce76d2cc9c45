//! Boundary to third-party routing services. Provider-native payloads stop
//! here; everything past this module sees `ProviderLeg`/`ProviderRoute` only.

pub mod osrm;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::coordinate::Coordinate;
use crate::models::distance::DistanceStatus;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider responded with http {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderLeg {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub status: DistanceStatus,
}

impl ProviderLeg {
    pub fn unroutable(status: DistanceStatus) -> Self {
        Self {
            distance_meters: 0.0,
            duration_seconds: 0.0,
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub status: DistanceStatus,
    /// One entry per consecutive pair of input points when `status` is OK.
    pub legs: Vec<ProviderLeg>,
    pub polyline: String,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn leg(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: &str,
    ) -> Result<ProviderLeg, ProviderError>;

    /// Route through `points` in the given order.
    async fn route(
        &self,
        points: &[Coordinate],
        profile: &str,
    ) -> Result<ProviderRoute, ProviderError>;
}

#[cfg(test)]
pub mod stub;
