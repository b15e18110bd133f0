//! ORDERLINE API Server Entry Point
//!
//! Boot order: telemetry, configuration, store connectivity, schema, cache
//! rehydration and ingestion tasks, then the HTTP server. Shutdown flips a
//! shared watch flag and drains every task within the configured grace.

use std::sync::Arc;
use std::time::Duration;

use orderline_api::{
    cache_restore_task, channel, create_router, ingestion_task, ApiError, ApiResult, AppState,
    DbClient, ServiceConfig,
};
use orderline_api::telemetry::{init_tracer, TelemetryConfig};
use orderline_storage::{OrderCache, OrderStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;

    let config = ServiceConfig::from_env()?;

    let db = DbClient::from_config(&config.db, config.ingest.save_mode)?;
    db.ping().await.map_err(|e| {
        tracing::error!(error = %e, host = %config.db.host, "Database unreachable at boot");
        ApiError::service_unavailable("Database unreachable")
    })?;
    if config.db.apply_schema {
        db.ensure_schema().await?;
    }
    let store: Arc<dyn OrderStore> = Arc::new(db);

    let cache = Arc::new(OrderCache::new(config.cache.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut restore = tokio::spawn(cache_restore_task(
        Arc::clone(&cache),
        Arc::clone(&store),
        shutdown_rx.clone(),
    ));

    let (publisher, source) = channel(config.ingest.channel_capacity);
    let mut ingestion = tokio::spawn(ingestion_task(
        source,
        Arc::clone(&store),
        config.ingest.clone(),
        shutdown_rx.clone(),
    ));

    let app = create_router(AppState::new(store, cache, publisher));

    let addr = config.api.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting orderline API server");

    let mut server_rx = shutdown_rx.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    let early_exit = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut server => Some(result),
    };

    shutdown_tx.send_replace(true);
    let grace = config.api.shutdown_grace;

    let server_result = match early_exit {
        Some(result) => {
            tracing::error!("HTTP server stopped unexpectedly");
            Some(result)
        }
        None => drain("http server", &mut server, grace).await,
    };

    if let Some(Ok(metrics)) = drain("ingestion", &mut ingestion, grace).await {
        let snapshot = metrics.snapshot();
        tracing::info!(
            received = snapshot.received,
            persisted = snapshot.persisted,
            rejected = snapshot.rejected,
            store_failures = snapshot.store_failures,
            "Ingestion drained"
        );
    }

    let _ = drain("cache restore", &mut restore, grace).await;

    tracing::info!("Shutdown complete");

    match server_result {
        Some(Ok(Ok(()))) | None => Ok(()),
        Some(Ok(Err(e))) => Err(ApiError::internal_error(format!("Server error: {}", e))),
        Some(Err(e)) => Err(ApiError::internal_error(format!("Server task failed: {}", e))),
    }
}

/// Await a task for at most `grace`, aborting it afterwards.
async fn drain<T>(
    name: &str,
    handle: &mut JoinHandle<T>,
    grace: Duration,
) -> Option<Result<T, tokio::task::JoinError>> {
    match tokio::time::timeout(grace, &mut *handle).await {
        Ok(result) => {
            if let Err(e) = &result {
                tracing::error!(task = name, error = %e, "Task panicked");
            }
            Some(result)
        }
        Err(_) => {
            tracing::warn!(task = name, grace_secs = grace.as_secs(), "Grace period elapsed, aborting task");
            handle.abort();
            None
        }
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
