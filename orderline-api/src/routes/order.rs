//! Order read path
//!
//! `GET /order/:id` is cache-aside: validate the identifier, try the cache,
//! fall back to the store on a miss and populate the cache with what the
//! store returned. Population is best-effort; a failed key-index write is
//! logged and the request still succeeds.

use std::time::Instant;

use axum::{extract::State, Json};
use orderline_core::{validate_order_uid, Order};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extractors::OrderUidPath;
#[cfg(feature = "openapi")]
use crate::error::ErrorBody;
use crate::state::AppState;
use crate::telemetry::metrics;

/// Where a returned order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Database,
}

/// Successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderResponse {
    pub order: Order,
    pub source: Source,
    /// Cache hits time the cache lookup only; database reads time the store
    /// round trip only.
    pub duration_ms: u64,
}

/// GET /order/:id - Fetch an order by identifier
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/order/{id}",
    tag = "Orders",
    params(
        ("id" = String, Path, description = "Order identifier, 5 to 50 bytes"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 400, description = "Malformed identifier", body = ErrorBody),
        (status = 404, description = "Order not found", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody),
    ),
))]
pub async fn get_order(
    State(state): State<AppState>,
    OrderUidPath(order_uid): OrderUidPath,
) -> ApiResult<Json<OrderResponse>> {
    tracing::debug!(order_uid = %order_uid, "Processing order lookup");
    validate_order_uid(&order_uid)?;

    let cache_start = Instant::now();
    let cached = state.cache.get(&order_uid);
    record_lookup(cached.is_some());

    if let Some(order) = cached {
        tracing::debug!(order_uid = %order_uid, "Order served from cache");
        return Ok(Json(OrderResponse {
            order,
            source: Source::Cache,
            duration_ms: elapsed_ms(cache_start),
        }));
    }

    tracing::debug!(order_uid = %order_uid, "Cache miss, querying store");
    let db_start = Instant::now();
    let order = state
        .store
        .get_order_by_uid(&order_uid)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                tracing::info!(order_uid = %order_uid, "Order not found");
            }
            ApiError::from(e)
        })?;
    let duration_ms = elapsed_ms(db_start);

    if let Err(e) = state.cache.set(order.clone()).await {
        tracing::warn!(order_uid = %order_uid, error = %e, "Failed to persist cache key index");
    }
    if let Some(metrics) = metrics() {
        metrics.set_cache_entries(state.cache.len());
    }

    Ok(Json(OrderResponse {
        order,
        source: Source::Database,
        duration_ms,
    }))
}

/// GET /order/ - Identifier missing
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/order/",
    tag = "Orders",
    responses(
        (status = 400, description = "Order ID not specified", body = ErrorBody),
    ),
))]
pub async fn missing_order_id() -> ApiError {
    ApiError::missing_order_id()
}

fn record_lookup(hit: bool) {
    if let Some(metrics) = metrics() {
        metrics.record_cache_lookup(hit);
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
