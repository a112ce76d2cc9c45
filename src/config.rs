use std::env;
use std::time::Duration;

use crate::engine::fees::PricingPolicy;
use crate::error::AppError;
use crate::geo::validator::ServiceRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Knobs for the distance engine's provider calls and haversine fallback.
#[derive(Debug, Clone)]
pub struct DistanceSettings {
    pub provider_url: Option<String>,
    pub profile: String,
    pub provider_timeout: Duration,
    pub cache_ttl: Duration,
    pub concurrency: usize,
    /// Multiplier turning great-circle distance into a road-distance estimate.
    pub road_factor: f64,
    pub fallback_speed_kmh: f64,
}

impl Default for DistanceSettings {
    fn default() -> Self {
        Self {
            provider_url: None,
            profile: "driving".to_string(),
            provider_timeout: Duration::from_millis(4_000),
            cache_ttl: Duration::from_secs(60),
            concurrency: 8,
            road_factor: 1.3,
            fallback_speed_kmh: 25.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub distance: DistanceSettings,
    pub pricing: PricingPolicy,
    pub service_region: ServiceRegion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            distance: DistanceSettings::default(),
            pricing: PricingPolicy::default(),
            service_region: ServiceRegion::philippines(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact/json"
                )));
            }
        };

        let defaults = DistanceSettings::default();
        let distance = DistanceSettings {
            provider_url: env::var("ROUTING_PROVIDER_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            profile: env::var("ROUTING_PROFILE").unwrap_or(defaults.profile),
            provider_timeout: Duration::from_millis(parse_or_default(
                "PROVIDER_TIMEOUT_MS",
                defaults.provider_timeout.as_millis() as u64,
            )?),
            cache_ttl: Duration::from_secs(parse_or_default(
                "DISTANCE_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            concurrency: parse_or_default("DISTANCE_CONCURRENCY", defaults.concurrency)?,
            road_factor: parse_or_default("ROAD_FACTOR", defaults.road_factor)?,
            fallback_speed_kmh: parse_or_default("FALLBACK_SPEED_KMH", defaults.fallback_speed_kmh)?,
        };

        let policy = PricingPolicy::default();
        let pricing = PricingPolicy {
            base_fee_cents: parse_or_default("BASE_FEE_CENTS", policy.base_fee_cents)?,
            per_km_rate_cents: parse_or_default("PER_KM_RATE_CENTS", policy.per_km_rate_cents)?,
            free_threshold_km: parse_or_default("FREE_THRESHOLD_KM", policy.free_threshold_km)?,
            default_radius_km: parse_or_default("DEFAULT_RADIUS_KM", policy.default_radius_km)?,
            prep_buffer_minutes: parse_or_default(
                "PREP_BUFFER_MINUTES",
                policy.prep_buffer_minutes,
            )?,
            platform_fee_cents: parse_or_default("PLATFORM_FEE_CENTS", policy.platform_fee_cents)?,
            commission_rate: parse_or_default("COMMISSION_RATE", policy.commission_rate)?,
            tax_rate: parse_or_default("TAX_RATE", policy.tax_rate)?,
        };

        let service_region = match env::var("SERVICE_REGION_FILE") {
            Ok(path) => load_region(&path)?,
            Err(_) => ServiceRegion::philippines(),
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            distance,
            pricing,
            service_region,
        };
        config.check()?;

        Ok(config)
    }

    fn check(&self) -> Result<(), AppError> {
        let distance = &self.distance;
        if distance.concurrency == 0 {
            return Err(AppError::Internal("DISTANCE_CONCURRENCY must be > 0".to_string()));
        }
        if !(distance.road_factor.is_finite() && distance.road_factor >= 1.0) {
            return Err(AppError::Internal("ROAD_FACTOR must be >= 1.0".to_string()));
        }
        if !(distance.fallback_speed_kmh.is_finite() && distance.fallback_speed_kmh > 0.0) {
            return Err(AppError::Internal("FALLBACK_SPEED_KMH must be > 0".to_string()));
        }
        if self.event_buffer_size == 0 {
            return Err(AppError::Internal("EVENT_BUFFER_SIZE must be > 0".to_string()));
        }
        self.pricing.check()
    }
}

fn load_region(path: &str) -> Result<ServiceRegion, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| AppError::Internal(format!("failed to read {path}: {err}")))?;
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Internal(format!("invalid service region in {path}: {err}")))
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
