// Prometheus metrics for the webhook gateway
// Tracks: webhook throughput, rejections by reason, ledger postings, latency

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    Encoder, Opts, Registry, TextEncoder,
};

/// Gateway metrics, registered on a private registry
pub struct Metrics {
    pub registry: Registry,

    // Webhook metrics
    pub webhook_requests_total: IntCounter,
    pub webhook_rejections_total: IntCounterVec,

    // Ledger metrics
    pub ledger_entries_total: IntCounter,
    pub balance_queries_total: IntCounter,

    // HTTP metrics
    pub http_request_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let webhook_requests_total = register_int_counter_with_registry!(
            Opts::new("webhook_requests_total", "Total webhook calls received"),
            registry
        )?;

        let webhook_rejections_total = register_int_counter_vec_with_registry!(
            Opts::new("webhook_rejections_total", "Webhook calls refused, by reason"),
            &["reason"],
            registry
        )?;

        let ledger_entries_total = register_int_counter_with_registry!(
            Opts::new("ledger_entries_total", "Entries applied to the ledger"),
            registry
        )?;

        let balance_queries_total = register_int_counter_with_registry!(
            Opts::new("balance_queries_total", "Balance lookups served"),
            registry
        )?;

        let http_request_duration_seconds = register_histogram_vec_with_registry!(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds"
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method", "status"],
            registry
        )?;

        Ok(Self {
            registry,
            webhook_requests_total,
            webhook_rejections_total,
            ledger_entries_total,
            balance_queries_total,
            http_request_duration_seconds,
        })
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Count a refused webhook call
    pub fn track_rejection(&self, reason: &str) {
        self.webhook_rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record one HTTP exchange
    pub fn observe_request(&self, method: &str, status: u16, seconds: f64) {
        self.http_request_duration_seconds
            .with_label_values(&[method, &status.to_string()])
            .observe(seconds);
    }
}
