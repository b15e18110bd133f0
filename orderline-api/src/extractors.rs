//! Path extractors that reject with the service's JSON error body.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::ApiError;

/// The `:id` segment of `/order/:id`, percent-decoded.
///
/// A segment that does not decode to UTF-8 is answered like any other
/// malformed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUidPath(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for OrderUidPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(order_uid): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::debug!(path = %parts.uri.path(), error = %e, "Undecodable order id");
                ApiError::invalid_order_id()
            })?;
        Ok(OrderUidPath(order_uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn echo(OrderUidPath(order_uid): OrderUidPath) -> String {
        order_uid
    }

    fn router() -> Router {
        Router::new().route("/order/:id", get(echo))
    }

    #[tokio::test]
    async fn test_decodes_percent_encoded_segment() {
        let response = router()
            .oneshot(Request::get("/order/abc%20de").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"abc de");
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected_as_json() {
        let response = router()
            .oneshot(Request::get("/order/%FF%FE%FD").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );
    }
}
