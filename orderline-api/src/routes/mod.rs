//! REST API Routes Module
//!
//! - `GET /order/:id` cache-aside order lookup
//! - `POST /ingest` message intake
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document

pub mod health;
pub mod ingest;
pub mod order;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

/// Build the complete application router.
///
/// Layers wrap every route, including health and metrics, so each request
/// gets a span, a completion log and an entry in the HTTP metrics.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/order", get(order::missing_order_id))
        .route("/order/", get(order::missing_order_id))
        .route("/order/:id", get(order::get_order))
        .route("/ingest", post(ingest::ingest_message))
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    let router = router.route("/openapi.json", get(openapi_json));

    router
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
}
