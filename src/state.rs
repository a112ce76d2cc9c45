use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::engine::dispatch::DispatchCoordinator;
use crate::engine::distance::DistanceEngine;
use crate::engine::fees::FeeCalculator;
use crate::engine::lifecycle::OrderLifecycle;
use crate::engine::optimizer::RouteOptimizer;
use crate::error::AppError;
use crate::geo::validator::GeoValidator;
use crate::models::events::DispatchEvent;
use crate::observability::metrics::Metrics;
use crate::routing::RoutingProvider;
use crate::routing::osrm::OsrmProvider;
use crate::store::RecordStore;
use crate::store::drivers::DriverRegistry;
use crate::store::memory::InMemoryStore;

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub drivers: Arc<DriverRegistry>,
    pub distance: Arc<DistanceEngine>,
    pub fees: FeeCalculator,
    pub optimizer: RouteOptimizer,
    pub lifecycle: OrderLifecycle,
    pub dispatch: Arc<DispatchCoordinator>,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires the components, using the configured HTTP routing provider if any.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let provider: Option<Arc<dyn RoutingProvider>> = match &config.distance.provider_url {
            Some(url) => {
                let provider = OsrmProvider::new(url.clone(), config.distance.provider_timeout)
                    .map_err(|err| AppError::Internal(format!("routing provider: {err}")))?;
                info!(provider_url = %url, "routing provider configured");
                Some(Arc::new(provider) as Arc<dyn RoutingProvider>)
            }
            None => {
                info!("no routing provider configured; distances are estimated");
                None
            }
        };

        Self::with_provider(config, provider)
    }

    pub fn with_provider(
        config: &Config,
        provider: Option<Arc<dyn RoutingProvider>>,
    ) -> Result<Self, AppError> {
        let metrics = Metrics::new();
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
        let drivers = Arc::new(DriverRegistry::new());

        let validator = GeoValidator::new(config.service_region.clone())?;
        let distance = Arc::new(DistanceEngine::new(
            validator,
            provider,
            config.distance.clone(),
            metrics.clone(),
        ));

        let dispatch = Arc::new(DispatchCoordinator::new(
            store.clone(),
            drivers.clone(),
            distance.clone(),
            events_tx.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            fees: FeeCalculator::new(distance.clone(), config.pricing.clone(), metrics.clone()),
            optimizer: RouteOptimizer::new(distance.clone()),
            lifecycle: OrderLifecycle::new(
                store.clone(),
                dispatch.clone(),
                events_tx.clone(),
                metrics.clone(),
            ),
            dispatch,
            store,
            drivers,
            distance,
            events_tx,
            metrics,
        })
    }
}
