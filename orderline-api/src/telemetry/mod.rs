//! Observability for the orderline service
//!
//! Structured logging through `tracing` and Prometheus metrics for the HTTP
//! layer, the cache, the store and the ingestion pipeline.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, OrderlineMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, LogFormat, TelemetryConfig};
