//! Prometheus Metrics Definitions
//!
//! Defines all orderline metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Store operation latency buckets (seconds)
const STORE_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<OrderlineMetrics>> = Lazy::new(OrderlineMetrics::new);

/// The registered metrics, or `None` if registration failed.
///
/// Registration failure is logged once by the caller that first sees it;
/// recording then becomes a no-op rather than an error.
pub fn metrics() -> Option<&'static OrderlineMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all orderline metrics.
#[derive(Clone)]
pub struct OrderlineMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache lookups - labels: result (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Orders currently held by the cache
    pub cache_entries: Gauge,

    /// Store operation counter - labels: operation, status
    pub store_operations_total: CounterVec,

    /// Store operation duration histogram - labels: operation
    pub store_operation_duration_seconds: HistogramVec,

    /// Inbound messages - labels: outcome (persisted/rejected/store_failed)
    pub ingest_messages_total: CounterVec,
}

impl OrderlineMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "orderline_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "orderline_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            cache_lookups_total: register_counter_vec!(
                "orderline_cache_lookups_total",
                "Total number of order cache lookups",
                &["result"]
            )
            .map_err(|e| registration_error("cache_lookups_total", e))?,

            cache_entries: register_gauge!(
                "orderline_cache_entries",
                "Current number of orders held in the cache"
            )
            .map_err(|e| registration_error("cache_entries", e))?,

            store_operations_total: register_counter_vec!(
                "orderline_store_operations_total",
                "Total number of order store operations",
                &["operation", "status"]
            )
            .map_err(|e| registration_error("store_operations_total", e))?,

            store_operation_duration_seconds: register_histogram_vec!(
                "orderline_store_operation_duration_seconds",
                "Order store operation duration in seconds",
                &["operation"],
                STORE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("store_operation_duration_seconds", e))?,

            ingest_messages_total: register_counter_vec!(
                "orderline_ingest_messages_total",
                "Total inbound messages by processing outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("ingest_messages_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a cache lookup.
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    /// Set the cached order count.
    pub fn set_cache_entries(&self, count: usize) {
        self.cache_entries.set(count as f64);
    }

    /// Record a store operation.
    pub fn record_store_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.store_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record the outcome of one inbound message.
    pub fn record_ingest(&self, outcome: &str) {
        self.ingest_messages_total.with_label_values(&[outcome]).inc();
    }
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    if let Err(e) = METRICS.as_ref() {
        tracing::error!(error = %e, "Metrics registration failed");
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
