//! `POST /ingest` hands a raw message to the ingestion pipeline.
//!
//! The body is not inspected here; validation happens in the pipeline so
//! that every source goes through the same checks.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
#[cfg(feature = "openapi")]
use crate::error::ErrorBody;
use crate::ingest::MessagePublisher;

/// Acknowledgement of an enqueued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestAccepted {
    pub status: String,
}

/// POST /ingest - Enqueue one order message
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/ingest",
    tag = "Ingestion",
    request_body(content = String, description = "Order JSON document", content_type = "application/json"),
    responses(
        (status = 202, description = "Message enqueued", body = IngestAccepted),
        (status = 503, description = "Ingestion pipeline not running", body = ErrorBody),
    ),
))]
pub async fn ingest_message(
    State(publisher): State<MessagePublisher>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    publisher.publish(body.to_vec()).await.map_err(|e| {
        tracing::warn!(error = %e, "Dropping message, pipeline is gone");
        ApiError::service_unavailable(e.to_string())
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted {
            status: "accepted".to_string(),
        }),
    ))
}
