//! Cache Rehydration Task
//!
//! Runs once at boot, concurrently with request serving. Orders listed in the
//! key index are fetched from the store and put back into the cache, so reads
//! warm up gradually instead of all missing after a restart.

use std::sync::Arc;

use orderline_storage::{OrderCache, OrderStore, RestoreReport};
use tokio::sync::watch;

use crate::telemetry::metrics;

/// Restore the cache, abandoning the pass if shutdown starts first.
///
/// Returns the report of a completed pass, or `None` when the pass was
/// cancelled or the index could not be read.
pub async fn cache_restore_task(
    cache: Arc<OrderCache>,
    store: Arc<dyn OrderStore>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Option<RestoreReport> {
    tracing::info!(
        index = %cache.key_index().path().display(),
        "Cache restore started"
    );

    let outcome = tokio::select! {
        result = cache.restore(store.as_ref()) => Some(result),
        _ = shutdown_rx.wait_for(|stop| *stop) => None,
    };

    if let Some(metrics) = metrics() {
        metrics.set_cache_entries(cache.len());
    }

    match outcome {
        Some(Ok(report)) => Some(report),
        Some(Err(e)) => {
            tracing::error!(error = %e, "Cache restore failed, starting cold");
            None
        }
        None => {
            tracing::info!(entries = cache.len(), "Cache restore cancelled by shutdown");
            None
        }
    }
}
