use std::sync::Arc;

use tracing::debug;

use crate::engine::distance::{DistanceEngine, MAX_WAYPOINTS};
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::distance::{OptimizedRoute, OrderedStop};

/// Greedy nearest-neighbor stop ordering. With at most eight stops an exact
/// tour is not worth computing.
pub struct RouteOptimizer {
    engine: Arc<DistanceEngine>,
}

impl RouteOptimizer {
    pub fn new(engine: Arc<DistanceEngine>) -> Self {
        Self { engine }
    }

    pub async fn optimize(
        &self,
        origin: Coordinate,
        stops: &[Coordinate],
        return_to_origin: bool,
    ) -> Result<OptimizedRoute, AppError> {
        if stops.is_empty() {
            return Err(AppError::BadRequest("at least one stop is required".to_string()));
        }
        if stops.len() > MAX_WAYPOINTS {
            return Err(AppError::LimitExceeded(format!(
                "{} stops requested, at most {MAX_WAYPOINTS} allowed",
                stops.len()
            )));
        }

        let mut remaining: Vec<usize> = (0..stops.len()).collect();
        let mut ordered = Vec::with_capacity(stops.len());
        let mut legs = Vec::with_capacity(stops.len() + 1);
        let mut current = origin;

        while !remaining.is_empty() {
            let candidates: Vec<Coordinate> = remaining.iter().map(|&i| stops[i]).collect();
            let results = self.engine.one_to_many(current, &candidates).await?;

            // min_by keeps the first of equal elements, so ties go to input order.
            let (pick, leg) = results
                .into_iter()
                .enumerate()
                .min_by(|a, b| a.1.rank_distance().total_cmp(&b.1.rank_distance()))
                .ok_or_else(|| AppError::Internal("empty distance batch".to_string()))?;

            let index = remaining.remove(pick);
            debug!(stop = index, distance_m = leg.distance_meters, "next stop chosen");

            ordered.push(OrderedStop {
                index,
                location: stops[index],
            });
            legs.push(leg);
            current = stops[index];
        }

        if return_to_origin {
            legs.push(self.engine.point_to_point(current, origin).await?);
        }

        Ok(OptimizedRoute {
            stops: ordered,
            total_distance_meters: legs.iter().map(|leg| leg.distance_meters).sum(),
            total_duration_seconds: legs.iter().map(|leg| leg.duration_seconds).sum(),
            estimated: legs.iter().any(|leg| leg.fallback),
            legs,
        })
    }
}
