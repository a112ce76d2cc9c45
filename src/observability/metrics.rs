use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub quotes_total: IntCounterVec,
    pub distance_fallbacks_total: IntCounterVec,
    pub provider_latency_seconds: HistogramVec,
    pub order_transitions_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub dispatch_conflicts_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let quotes_total = IntCounterVec::new(
            Opts::new("quotes_total", "Delivery quotes served by estimation mode"),
            &["estimated"],
        )
        .expect("valid quotes_total metric");

        let distance_fallbacks_total = IntCounterVec::new(
            Opts::new(
                "distance_fallbacks_total",
                "Distance lookups answered by the haversine fallback",
            ),
            &["reason"],
        )
        .expect("valid distance_fallbacks_total metric");

        let provider_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "provider_latency_seconds",
                "Latency of routing provider calls in seconds",
            ),
            &["outcome"],
        )
        .expect("valid provider_latency_seconds metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Committed order status transitions"),
            &["to_status"],
        )
        .expect("valid order_transitions_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Driver assignment state changes"),
            &["status"],
        )
        .expect("valid assignments_total metric");

        let dispatch_conflicts_total = IntCounter::new(
            "dispatch_conflicts_total",
            "Order mutations rejected by the version check",
        )
        .expect("valid dispatch_conflicts_total metric");

        registry
            .register(Box::new(quotes_total.clone()))
            .expect("register quotes_total");
        registry
            .register(Box::new(distance_fallbacks_total.clone()))
            .expect("register distance_fallbacks_total");
        registry
            .register(Box::new(provider_latency_seconds.clone()))
            .expect("register provider_latency_seconds");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(dispatch_conflicts_total.clone()))
            .expect("register dispatch_conflicts_total");

        Self {
            registry,
            quotes_total,
            distance_fallbacks_total,
            provider_latency_seconds,
            order_transitions_total,
            assignments_total,
            dispatch_conflicts_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
