use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures::{StreamExt, TryStreamExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::DistanceSettings;
use crate::error::AppError;
use crate::geo::validator::GeoValidator;
use crate::geo::{haversine_meters, polyline};
use crate::models::coordinate::Coordinate;
use crate::models::distance::{DistanceResult, DistanceStatus, Route};
use crate::observability::metrics::Metrics;
use crate::routing::{ProviderLeg, RoutingProvider};

pub const MAX_DESTINATIONS: usize = 25;
pub const MAX_WAYPOINTS: usize = 8;
/// Entry count at which inserts first sweep expired entries, and past which
/// fresh results are not cached at all.
pub const CACHE_CAPACITY: usize = 4_096;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    origin: (u64, u64),
    destination: (u64, u64),
    profile: String,
}

impl CacheKey {
    fn new(origin: &Coordinate, destination: &Coordinate, profile: &str) -> Self {
        Self {
            origin: (origin.lat.to_bits(), origin.lng.to_bits()),
            destination: (destination.lat.to_bits(), destination.lng.to_bits()),
            profile: profile.to_string(),
        }
    }
}

pub struct DistanceEngine {
    validator: GeoValidator,
    provider: Option<Arc<dyn RoutingProvider>>,
    settings: DistanceSettings,
    cache: DashMap<CacheKey, (DistanceResult, Instant)>,
    metrics: Metrics,
}

impl DistanceEngine {
    pub fn new(
        validator: GeoValidator,
        provider: Option<Arc<dyn RoutingProvider>>,
        settings: DistanceSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            validator,
            provider,
            settings,
            cache: DashMap::new(),
            metrics,
        }
    }

    pub fn validator(&self) -> &GeoValidator {
        &self.validator
    }

    pub async fn point_to_point(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DistanceResult, AppError> {
        self.validator.ensure_serviceable(&origin)?;
        self.validator.ensure_serviceable(&destination)?;
        self.measure(origin, destination).await
    }

    /// Results come back in destination order. A provider failure on one
    /// destination only downgrades that entry to an estimate.
    pub async fn one_to_many(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> Result<Vec<DistanceResult>, AppError> {
        if destinations.is_empty() {
            return Err(AppError::BadRequest(
                "at least one destination is required".to_string(),
            ));
        }
        if destinations.len() > MAX_DESTINATIONS {
            return Err(AppError::LimitExceeded(format!(
                "{} destinations requested, at most {MAX_DESTINATIONS} allowed",
                destinations.len()
            )));
        }

        self.validator.ensure_serviceable(&origin)?;
        for destination in destinations {
            self.validator.ensure_serviceable(destination)?;
        }

        futures::stream::iter(destinations.iter().copied())
            .map(|destination| self.measure(origin, destination))
            .buffered(self.settings.concurrency)
            .try_collect()
            .await
    }

    /// Multi-stop route through `waypoints` in the order given.
    pub async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        waypoints: &[Coordinate],
    ) -> Result<Route, AppError> {
        if waypoints.len() > MAX_WAYPOINTS {
            return Err(AppError::LimitExceeded(format!(
                "{} waypoints requested, at most {MAX_WAYPOINTS} allowed",
                waypoints.len()
            )));
        }

        let mut points = Vec::with_capacity(waypoints.len() + 2);
        points.push(origin);
        points.extend_from_slice(waypoints);
        points.push(destination);

        for point in &points {
            self.validator.ensure_serviceable(point)?;
        }

        let Some(provider) = &self.provider else {
            return self.estimated_route(&points, "no_provider");
        };

        let started = Instant::now();
        let outcome = timeout(
            self.settings.provider_timeout,
            provider.route(&points, &self.settings.profile),
        )
        .await;

        match outcome {
            Ok(Ok(route)) if route.status != DistanceStatus::Ok => {
                self.observe_provider("ok", started);
                let legs = points
                    .windows(2)
                    .map(|_| to_result(ProviderLeg::unroutable(route.status)))
                    .collect();
                Ok(Route::from_legs(legs, String::new()))
            }
            Ok(Ok(route)) if route.legs.len() == points.len() - 1 => {
                self.observe_provider("ok", started);
                let legs = route.legs.into_iter().map(to_result).collect();
                Ok(Route::from_legs(legs, route.polyline))
            }
            Ok(Ok(route)) => {
                self.observe_provider("error", started);
                warn!(
                    expected = points.len() - 1,
                    received = route.legs.len(),
                    "provider route leg count mismatch; estimating"
                );
                self.estimated_route(&points, "provider_error")
            }
            Ok(Err(err)) => {
                self.observe_provider("error", started);
                warn!(error = %err, "provider route failed; estimating");
                self.estimated_route(&points, "provider_error")
            }
            Err(_) => {
                self.observe_provider("timeout", started);
                warn!(
                    timeout_ms = self.settings.provider_timeout.as_millis() as u64,
                    "provider route timed out; estimating"
                );
                self.estimated_route(&points, "timeout")
            }
        }
    }

    /// Network-free great-circle estimate scaled by the road factor.
    pub fn estimate(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
    ) -> Result<DistanceResult, AppError> {
        let distance_meters = haversine_meters(origin, destination) * self.settings.road_factor;
        let speed_mps = self.settings.fallback_speed_kmh / 3.6;
        let seconds = distance_meters / speed_mps;

        if !(distance_meters.is_finite() && seconds.is_finite()) {
            return Err(AppError::DistanceUnavailable(format!(
                "cannot estimate distance between {origin} and {destination}"
            )));
        }

        Ok(DistanceResult {
            distance_meters,
            duration_seconds: seconds.floor() as u64,
            status: DistanceStatus::Ok,
            fallback: true,
        })
    }

    async fn measure(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DistanceResult, AppError> {
        let key = CacheKey::new(&origin, &destination, &self.settings.profile);
        if let Some(hit) = self.cached(&key) {
            debug!(%origin, %destination, "distance cache hit");
            return Ok(hit);
        }

        let Some(provider) = &self.provider else {
            return self.fallback(&origin, &destination, "no_provider");
        };

        let started = Instant::now();
        let outcome = timeout(
            self.settings.provider_timeout,
            provider.leg(origin, destination, &self.settings.profile),
        )
        .await;

        match outcome {
            Ok(Ok(leg)) if is_sane(&leg) => {
                self.observe_provider("ok", started);
                let result = to_result(leg);
                if result.is_ok() {
                    self.remember(key, result);
                }
                Ok(result)
            }
            Ok(Ok(leg)) => {
                self.observe_provider("error", started);
                warn!(?leg, %origin, %destination, "provider returned nonsensical leg; estimating");
                self.fallback(&origin, &destination, "provider_error")
            }
            Ok(Err(err)) => {
                self.observe_provider("error", started);
                warn!(error = %err, %origin, %destination, "provider failed; estimating");
                self.fallback(&origin, &destination, "provider_error")
            }
            Err(_) => {
                self.observe_provider("timeout", started);
                warn!(
                    %origin,
                    %destination,
                    timeout_ms = self.settings.provider_timeout.as_millis() as u64,
                    "provider timed out; estimating"
                );
                self.fallback(&origin, &destination, "timeout")
            }
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<DistanceResult> {
        let entry = self.cache.get(key)?;
        let (result, stored_at) = *entry.value();
        if stored_at.elapsed() < self.settings.cache_ttl {
            return Some(result);
        }
        drop(entry);
        self.cache.remove(key);
        None
    }

    fn remember(&self, key: CacheKey, result: DistanceResult) {
        if self.settings.cache_ttl.is_zero() {
            return;
        }
        if self.cache.len() >= CACHE_CAPACITY {
            let evicted = self.evict_expired();
            debug!(evicted, "swept distance cache");
            if self.cache.len() >= CACHE_CAPACITY {
                return;
            }
        }
        self.cache.insert(key, (result, Instant::now()));
    }

    /// Drops every entry older than the cache TTL. Returns how many went.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.settings.cache_ttl;
        let before = self.cache.len();
        self.cache.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
        before.saturating_sub(self.cache.len())
    }

    fn fallback(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
        reason: &str,
    ) -> Result<DistanceResult, AppError> {
        self.metrics
            .distance_fallbacks_total
            .with_label_values(&[reason])
            .inc();
        self.estimate(origin, destination)
    }

    fn estimated_route(&self, points: &[Coordinate], reason: &str) -> Result<Route, AppError> {
        self.metrics
            .distance_fallbacks_total
            .with_label_values(&[reason])
            .inc();

        let legs = points
            .windows(2)
            .map(|pair| self.estimate(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Route::from_legs(legs, polyline::encode(points)))
    }

    fn observe_provider(&self, outcome: &str, started: Instant) {
        self.metrics
            .provider_latency_seconds
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());
    }
}

fn is_sane(leg: &ProviderLeg) -> bool {
    leg.distance_meters.is_finite()
        && leg.distance_meters >= 0.0
        && leg.duration_seconds.is_finite()
        && leg.duration_seconds >= 0.0
}

fn to_result(leg: ProviderLeg) -> DistanceResult {
    DistanceResult {
        distance_meters: leg.distance_meters,
        duration_seconds: leg.duration_seconds.floor() as u64,
        status: leg.status,
        fallback: false,
    }
}
