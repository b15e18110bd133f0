//! Consume-validate-persist loop
//!
//! The loop takes one message at a time from a [`MessageSource`], parses and
//! validates it with [`orderline_core::parse_order`] and writes it with
//! [`OrderStore::save_order`]. Rejections and store failures are logged,
//! counted and skipped; nothing is retried.
//!
//! # Cancellation
//!
//! The loop watches a process-wide `watch::Receiver<bool>`. It exits when the
//! flag becomes true (or its sender is dropped) while waiting for a message,
//! and when the source reports the end of the stream. A message already
//! received is always processed to completion first.
//!
//! The pipeline never touches the cache.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orderline_core::{parse_order, OrderlineError, ValidationError};
use orderline_storage::{OrderStore, SaveMode};
use tokio::sync::watch;

use super::source::{ChannelSource, JsonLinesSource, MessageSource, RecvError};
use crate::config::parse_var;
use crate::constants::{DEFAULT_INGEST_CHANNEL_CAPACITY, DEFAULT_INGEST_RECV_BACKOFF_MS};
use crate::error::ApiResult;
use crate::telemetry::metrics;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the ingestion task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// How the store treats a duplicate `order_uid` (default: upsert)
    pub save_mode: SaveMode,

    /// Bound of the in-process channel behind `POST /ingest` (default: 1024)
    pub channel_capacity: usize,

    /// JSON-lines file replayed before the live stream is consumed
    pub replay_file: Option<PathBuf>,

    /// Pause before retrying after a transient receive failure
    /// (default: 250 ms)
    pub recv_error_backoff: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            save_mode: SaveMode::default(),
            channel_capacity: DEFAULT_INGEST_CHANNEL_CAPACITY,
            replay_file: None,
            recv_error_backoff: Duration::from_millis(DEFAULT_INGEST_RECV_BACKOFF_MS),
        }
    }
}

impl IngestConfig {
    /// Create IngestConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ORDERLINE_INGEST_SAVE_MODE`: `upsert` or `insert` (default: upsert)
    /// - `ORDERLINE_INGEST_CHANNEL_CAPACITY`: Channel bound (default: 1024)
    /// - `ORDERLINE_INGEST_REPLAY_FILE`: Optional JSON-lines replay file
    /// - `ORDERLINE_INGEST_RECV_BACKOFF_MS`: Receive retry pause (default: 250)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let save_mode = parse_var(lookup, "ORDERLINE_INGEST_SAVE_MODE", SaveMode::default())?;
        let channel_capacity = parse_var(
            lookup,
            "ORDERLINE_INGEST_CHANNEL_CAPACITY",
            DEFAULT_INGEST_CHANNEL_CAPACITY,
        )?;
        let replay_file = lookup("ORDERLINE_INGEST_REPLAY_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let backoff_ms = parse_var(
            lookup,
            "ORDERLINE_INGEST_RECV_BACKOFF_MS",
            DEFAULT_INGEST_RECV_BACKOFF_MS,
        )?;

        Ok(Self {
            save_mode,
            channel_capacity,
            replay_file,
            recv_error_backoff: Duration::from_millis(backoff_ms),
        })
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the ingestion task.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Messages taken from the source
    pub received: AtomicU64,

    /// Orders written to the store
    pub persisted: AtomicU64,

    /// Messages that failed validation
    pub rejected: AtomicU64,

    /// Valid orders the store refused or failed to write
    pub store_failures: AtomicU64,

    /// Transient receive failures
    pub recv_errors: AtomicU64,
}

impl IngestMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &MessageOutcome) {
        let counter = match outcome {
            MessageOutcome::Persisted { .. } => &self.persisted,
            MessageOutcome::Rejected(_) => &self.rejected,
            MessageOutcome::StoreFailed { .. } => &self.store_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Some(metrics) = metrics() {
            metrics.record_ingest(outcome.label());
        }
    }
}

/// Snapshot of ingestion metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub received: u64,
    pub persisted: u64,
    pub rejected: u64,
    pub store_failures: u64,
    pub recv_errors: u64,
}

// ============================================================================
// PER-MESSAGE PROCESSING
// ============================================================================

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The order is in the store.
    Persisted { order_uid: String },
    /// The payload failed validation and never reached the store.
    Rejected(ValidationError),
    /// The order was valid but the store write failed.
    StoreFailed {
        order_uid: String,
        error: OrderlineError,
    },
}

impl MessageOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Persisted { .. } => "persisted",
            MessageOutcome::Rejected(_) => "rejected",
            MessageOutcome::StoreFailed { .. } => "store_failed",
        }
    }
}

/// Validate and persist one message.
pub async fn process_message<S>(store: &S, payload: &[u8]) -> MessageOutcome
where
    S: OrderStore + ?Sized,
{
    let order = match parse_order(payload) {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(error = %e, bytes = payload.len(), "Rejected inbound message");
            return MessageOutcome::Rejected(e);
        }
    };

    match store.save_order(&order).await {
        Ok(()) => {
            tracing::info!(
                order_uid = %order.order_uid,
                items = order.item_count(),
                "Order persisted"
            );
            MessageOutcome::Persisted {
                order_uid: order.order_uid,
            }
        }
        Err(error) => {
            tracing::error!(order_uid = %order.order_uid, error = %error, "Failed to persist order");
            MessageOutcome::StoreFailed {
                order_uid: order.order_uid,
                error,
            }
        }
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Consume `source` until shutdown or end of stream.
///
/// Returns the metrics collected during the run.
pub async fn run_ingestion<M>(
    source: &mut M,
    store: Arc<dyn OrderStore>,
    config: &IngestConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Arc<IngestMetrics>
where
    M: MessageSource + ?Sized,
{
    let metrics = Arc::new(IngestMetrics::new());
    consume(source, store.as_ref(), config, shutdown_rx, &metrics).await;
    log_completed(&metrics);
    metrics
}

/// The service's ingestion task: replay the configured file (if any), then
/// consume the live channel. Both phases share one set of counters.
///
/// A replay file that cannot be opened or read is abandoned; the live
/// channel is consumed either way.
pub async fn ingestion_task(
    mut live: ChannelSource,
    store: Arc<dyn OrderStore>,
    config: IngestConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Arc<IngestMetrics> {
    let metrics = Arc::new(IngestMetrics::new());

    tracing::info!(
        save_mode = %config.save_mode,
        channel_capacity = config.channel_capacity,
        replay_file = ?config.replay_file,
        "Ingestion task started"
    );

    if let Some(path) = &config.replay_file {
        match JsonLinesSource::open(path).await {
            Ok(mut replay) => {
                tracing::info!(path = %replay.path().display(), "Replaying messages from file");
                let stopped = consume(
                    &mut replay,
                    store.as_ref(),
                    &config,
                    shutdown_rx.clone(),
                    &metrics,
                )
                .await;
                if stopped == Stop::Shutdown {
                    log_completed(&metrics);
                    return metrics;
                }
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Cannot open replay file");
            }
        }
    }

    consume(&mut live, store.as_ref(), &config, shutdown_rx, &metrics).await;
    log_completed(&metrics);
    metrics
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Shutdown,
    EndOfStream,
}

async fn consume<M>(
    source: &mut M,
    store: &dyn OrderStore,
    config: &IngestConfig,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: &IngestMetrics,
) -> Stop
where
    M: MessageSource + ?Sized,
{
    loop {
        if *shutdown_rx.borrow() {
            tracing::info!("Ingestion shutting down");
            return Stop::Shutdown;
        }

        let received = tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    tracing::info!("Shutdown channel dropped, ingestion stopping");
                    return Stop::Shutdown;
                }
                continue;
            }

            received = source.recv() => received,
        };

        match received {
            Ok(payload) => {
                metrics.received.fetch_add(1, Ordering::Relaxed);
                let outcome = process_message(store, &payload).await;
                metrics.record(&outcome);
            }
            Err(RecvError::Closed) => {
                tracing::info!("Message stream ended");
                return Stop::EndOfStream;
            }
            Err(RecvError::Transport(reason)) => {
                metrics.recv_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %reason,
                    backoff_ms = config.recv_error_backoff.as_millis() as u64,
                    "Receive failed, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(config.recv_error_backoff) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }
    }
}

fn log_completed(metrics: &IngestMetrics) {
    let snapshot = metrics.snapshot();
    tracing::info!(
        received = snapshot.received,
        persisted = snapshot.persisted,
        rejected = snapshot.rejected,
        store_failures = snapshot.store_failures,
        recv_errors = snapshot.recv_errors,
        "Ingestion task completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_from_env_defaults() -> ApiResult<()> {
        let config = IngestConfig::from_lookup(&vars(&[]))?;
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.save_mode, SaveMode::Upsert);
        assert_eq!(config.channel_capacity, DEFAULT_INGEST_CHANNEL_CAPACITY);
        assert_eq!(config.recv_error_backoff, Duration::from_millis(250));
        assert!(config.replay_file.is_none());
        Ok(())
    }

    #[test]
    fn test_config_overrides() -> ApiResult<()> {
        let config = IngestConfig::from_lookup(&vars(&[
            ("ORDERLINE_INGEST_SAVE_MODE", "insert"),
            ("ORDERLINE_INGEST_CHANNEL_CAPACITY", "8"),
            ("ORDERLINE_INGEST_REPLAY_FILE", "/data/orders.jsonl"),
            ("ORDERLINE_INGEST_RECV_BACKOFF_MS", "10"),
        ]))?;
        assert_eq!(config.save_mode, SaveMode::Insert);
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.replay_file, Some(PathBuf::from("/data/orders.jsonl")));
        assert_eq!(config.recv_error_backoff, Duration::from_millis(10));
        Ok(())
    }

    #[test]
    fn test_config_rejects_unknown_save_mode() {
        let err = IngestConfig::from_lookup(&vars(&[("ORDERLINE_INGEST_SAVE_MODE", "merge")]))
            .unwrap_err();
        assert!(err.message.contains("ORDERLINE_INGEST_SAVE_MODE"));
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = IngestMetrics::new();
        metrics.received.store(5, Ordering::Relaxed);
        metrics.persisted.store(3, Ordering::Relaxed);
        metrics.rejected.store(2, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 5);
        assert_eq!(snapshot.persisted, 3);
        assert_eq!(snapshot.rejected, 2);
        assert_eq!(snapshot.store_failures, 0);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            MessageOutcome::Persisted {
                order_uid: "A1000".to_string()
            }
            .label(),
            "persisted"
        );
        assert_eq!(
            MessageOutcome::Rejected(ValidationError::EmptyOrderUid).label(),
            "rejected"
        );
    }
}
