//! Metrics collection for observability

use prometheus::{
    CounterVec, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

use crate::gateway::TokenUsage;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // HTTP endpoint metrics
    pub requests: CounterVec,
    pub request_duration: HistogramVec,

    // Relay metrics
    pub relay_events: CounterVec,
    pub relay_tokens: CounterVec,

    // Upstream metrics
    pub gateway_requests: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let requests = register_counter_vec_with_registry!(
            Opts::new("relay_requests_total", "Total API requests"),
            &["endpoint", "status"],
            registry
        )?;

        let request_duration = register_histogram_vec_with_registry!(
            "relay_request_duration_seconds",
            "Time to first response byte in seconds",
            &["endpoint"],
            registry
        )?;

        let relay_events = register_counter_vec_with_registry!(
            Opts::new("relay_events_total", "Total relay events emitted"),
            &["kind"],
            registry
        )?;

        let relay_tokens = register_counter_vec_with_registry!(
            Opts::new("relay_tokens_total", "Tokens reported by the model provider"),
            &["kind"],
            registry
        )?;

        let gateway_requests = register_counter_vec_with_registry!(
            Opts::new("gateway_requests_total", "Total completion requests sent upstream"),
            &["status"],
            registry
        )?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests,
            request_duration,
            relay_events,
            relay_tokens,
            gateway_requests,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a handled API request
    pub fn record_request(&self, endpoint: &str, success: bool, elapsed_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.requests.with_label_values(&[endpoint, status]).inc();
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(elapsed_secs);
    }

    /// Record one relay event by kind
    pub fn record_relay_event(&self, kind: &str) {
        self.relay_events.with_label_values(&[kind]).inc();
    }

    /// Record provider token accounting
    pub fn record_token_usage(&self, usage: &TokenUsage) {
        self.relay_tokens
            .with_label_values(&["prompt"])
            .inc_by(usage.prompt_tokens as f64);
        self.relay_tokens
            .with_label_values(&["completion"])
            .inc_by(usage.completion_tokens as f64);
    }

    /// Record an upstream completion request
    pub fn record_gateway_request(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.gateway_requests.with_label_values(&[status]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
