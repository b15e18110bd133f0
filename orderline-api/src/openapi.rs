//! OpenAPI document for the orderline HTTP surface.

use utoipa::OpenApi;

use crate::error::{ErrorBody, ErrorCode};
use crate::routes::{health, ingest, order};
use crate::telemetry;

use orderline_core::{Delivery, Item, Order, Payment};

/// OpenAPI document for the orderline API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "orderline API",
        version = "0.1.0",
        description = "Order ingestion and cached order lookup",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Orders", description = "Cache-aside order lookup"),
        (name = "Ingestion", description = "Order message intake"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        order::get_order,
        order::missing_order_id,
        ingest::ingest_message,
        health::ping,
        health::liveness,
        health::readiness,
        telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            Order, Delivery, Payment, Item,
            order::OrderResponse, order::Source,
            ingest::IngestAccepted,
            ErrorBody, ErrorCode,
            health::HealthResponse, health::HealthStatus,
            health::HealthDetails, health::ComponentHealth,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
