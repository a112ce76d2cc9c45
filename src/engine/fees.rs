use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::distance::DistanceEngine;
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::distance::DeliveryQuote;
use crate::models::order::{Earnings, Pricing};
use crate::observability::metrics::Metrics;

/// Deployment-tunable pricing. Money in currency minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub base_fee_cents: i64,
    pub per_km_rate_cents: i64,
    /// Distance covered by the base fee alone.
    pub free_threshold_km: f64,
    pub default_radius_km: f64,
    pub prep_buffer_minutes: u64,
    pub platform_fee_cents: i64,
    /// Share of the food subtotal kept by the platform.
    pub commission_rate: f64,
    pub tax_rate: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base_fee_cents: 4_900,
            per_km_rate_cents: 1_000,
            free_threshold_km: 3.0,
            default_radius_km: 5.0,
            prep_buffer_minutes: 15,
            platform_fee_cents: 1_500,
            commission_rate: 0.15,
            tax_rate: 0.12,
        }
    }
}

impl PricingPolicy {
    pub fn check(&self) -> Result<(), AppError> {
        let invalid = |what: &str| Err(AppError::Internal(format!("invalid pricing policy: {what}")));

        if self.base_fee_cents < 0 || self.per_km_rate_cents < 0 || self.platform_fee_cents < 0 {
            return invalid("fees must be non-negative");
        }
        if !(self.free_threshold_km.is_finite() && self.free_threshold_km >= 0.0) {
            return invalid("free threshold must be a non-negative distance");
        }
        if !(self.default_radius_km.is_finite() && self.default_radius_km > 0.0) {
            return invalid("default radius must be positive");
        }
        for (name, rate) in [("commission", self.commission_rate), ("tax", self.tax_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return invalid(&format!("{name} rate must be within [0, 1]"));
            }
        }
        Ok(())
    }

    /// `base + max(0, km - free_threshold) * per_km`, to the nearest minor unit.
    pub fn fee_for(&self, distance_km: f64) -> i64 {
        let billable_km = (distance_km - self.free_threshold_km).max(0.0);
        self.base_fee_cents + (billable_km * self.per_km_rate_cents as f64).round() as i64
    }

    pub fn eta_minutes(&self, duration_seconds: u64) -> u64 {
        duration_seconds.div_ceil(60) + self.prep_buffer_minutes
    }
}

pub struct FeeCalculator {
    engine: Arc<DistanceEngine>,
    policy: PricingPolicy,
    metrics: Metrics,
}

impl FeeCalculator {
    pub fn new(engine: Arc<DistanceEngine>, policy: PricingPolicy, metrics: Metrics) -> Self {
        Self {
            engine,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Being outside the radius is reported, not rejected.
    pub async fn quote(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        radius_km: Option<f64>,
    ) -> Result<DeliveryQuote, AppError> {
        let radius_km = radius_km.unwrap_or(self.policy.default_radius_km);
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(AppError::BadRequest(format!(
                "radius must be a positive number of km, got {radius_km}"
            )));
        }

        let distance = self.engine.point_to_point(origin, destination).await?;
        if !distance.is_ok() {
            return Err(AppError::DistanceUnavailable(format!(
                "no route from {origin} to {destination} ({:?})",
                distance.status
            )));
        }

        let distance_km = distance.distance_km();
        let quote = DeliveryQuote {
            distance_meters: distance.distance_meters,
            duration_seconds: distance.duration_seconds,
            fee_cents: self.policy.fee_for(distance_km),
            eta_minutes: self.policy.eta_minutes(distance.duration_seconds),
            within_service_radius: distance_km <= radius_km,
            estimated: distance.fallback,
        };

        self.metrics
            .quotes_total
            .with_label_values(&[if quote.estimated { "true" } else { "false" }])
            .inc();

        info!(
            distance_m = quote.distance_meters,
            fee_cents = quote.fee_cents,
            eta_minutes = quote.eta_minutes,
            within_radius = quote.within_service_radius,
            estimated = quote.estimated,
            "delivery quoted"
        );

        Ok(quote)
    }

    /// Order totals plus the earnings split that reconciles against them.
    pub fn price_order(
        &self,
        subtotal_cents: i64,
        delivery_fee_cents: i64,
    ) -> Result<(Pricing, Earnings), AppError> {
        if subtotal_cents < 0 || delivery_fee_cents < 0 {
            return Err(AppError::BadRequest(
                "order amounts must be non-negative".to_string(),
            ));
        }

        let tax = (subtotal_cents as f64 * self.policy.tax_rate).round() as i64;
        let food_commission = (subtotal_cents as f64 * self.policy.commission_rate).round() as i64;

        let pricing = Pricing::new(
            subtotal_cents,
            tax,
            delivery_fee_cents,
            self.policy.platform_fee_cents,
        );
        let earnings = Earnings {
            vendor_earnings: subtotal_cents - food_commission,
            driver_earnings: delivery_fee_cents,
            platform_commission: food_commission + self.policy.platform_fee_cents,
        };

        Ok((pricing, earnings))
    }
}
