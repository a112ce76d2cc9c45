use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::geo::haversine_meters;
use crate::models::coordinate::Coordinate;
use crate::models::distance::DistanceStatus;
use crate::routing::{ProviderError, ProviderLeg, ProviderRoute, RoutingProvider};

type LegFn = dyn Fn(Coordinate, Coordinate) -> Result<ProviderLeg, ProviderError> + Send + Sync;

/// Scriptable provider for unit tests.
pub struct StubProvider {
    leg_fn: Box<LegFn>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(
        leg_fn: impl Fn(Coordinate, Coordinate) -> Result<ProviderLeg, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            leg_fn: Box::new(leg_fn),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Straight-line distance × 1.2 at 30 km/h.
    pub fn straight_line() -> Self {
        Self::new(|a, b| {
            let meters = haversine_meters(&a, &b) * 1.2;
            Ok(ProviderLeg {
                distance_meters: meters,
                duration_seconds: meters / (30.0 / 3.6),
                status: DistanceStatus::Ok,
            })
        })
    }

    pub fn failing() -> Self {
        Self::new(|_, _| Err(ProviderError::Status(503)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RoutingProvider for StubProvider {
    async fn leg(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _profile: &str,
    ) -> Result<ProviderLeg, ProviderError> {
        self.pause().await;
        (self.leg_fn)(origin, destination)
    }

    async fn route(
        &self,
        points: &[Coordinate],
        _profile: &str,
    ) -> Result<ProviderRoute, ProviderError> {
        self.pause().await;
        let legs = points
            .windows(2)
            .map(|pair| (self.leg_fn)(pair[0], pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProviderRoute {
            status: DistanceStatus::Ok,
            legs,
            polyline: "stub".to_string(),
        })
    }
}
