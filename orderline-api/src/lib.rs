//! ORDERLINE API - Ingestion Pipeline and Order Read Path
//!
//! This crate wires the order service together: the PostgreSQL
//! [`OrderStore`](orderline_storage::OrderStore) implementation, the
//! ingestion loop that validates and persists inbound messages, the
//! cache rehydration job and the Axum router serving `GET /order/:id`.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod extractors;
pub mod ingest;
pub mod jobs;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, ServiceConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorBody, ErrorCode};
pub use ingest::{
    channel, ingestion_task, process_message, run_ingestion, IngestConfig, IngestMetrics,
    MessageOutcome, MessagePublisher, MessageSource,
};
pub use jobs::cache_restore_task;
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
