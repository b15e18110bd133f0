//! Error Types for the orderline API
//!
//! This module defines error handling for the HTTP layer:
//! - `ErrorCode` categorizes failures and maps them to status codes
//! - `ApiError` carries a code plus a client-safe message
//! - `IntoResponse` renders every error as `{"error": "<message>"}`
//!
//! Internal details (SQL errors, file paths) are logged where they are
//! converted and never reach the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orderline_core::{OrderlineError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Order identifier is absent
    MissingOrderId,

    /// Order identifier has the wrong length
    InvalidOrderId,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested order does not exist
    OrderNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingOrderId | ErrorCode::InvalidOrderId => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::OrderNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingOrderId => "Order ID not specified",
            ErrorCode::InvalidOrderId => "Invalid order ID length",
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error for API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Client-safe message, rendered as the `error` field
    pub message: String,
}

/// Wire shape of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingOrderId error.
    pub fn missing_order_id() -> Self {
        Self::from_code(ErrorCode::MissingOrderId)
    }

    /// Create an InvalidOrderId error.
    pub fn invalid_order_id() -> Self {
        Self::from_code(ErrorCode::InvalidOrderId)
    }

    /// Create an OrderNotFound error.
    pub fn order_not_found() -> Self {
        Self::from_code(ErrorCode::OrderNotFound)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a DatabaseError.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Create a ConnectionPoolExhausted error.
    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.message,
        });
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyOrderUid => ApiError::missing_order_id(),
            ValidationError::InvalidOrderUidLength { .. } => ApiError::invalid_order_id(),
            other => ApiError::invalid_input(other.to_string()),
        }
    }
}

impl From<OrderlineError> for ApiError {
    fn from(err: OrderlineError) -> Self {
        match err {
            OrderlineError::Validation(e) => e.into(),
            OrderlineError::Storage(StorageError::NotFound { .. }) => ApiError::order_not_found(),
            OrderlineError::Storage(e) => {
                tracing::error!(error = %e, "Store error");
                ApiError::from_code(ErrorCode::DatabaseError)
            }
            OrderlineError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::from_code(ErrorCode::DatabaseError)
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidOrderId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::MissingOrderId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OrderNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::DatabaseError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = OrderlineError::from(StorageError::NotFound {
            order_uid: "A1000".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert_eq!(err.message, "Order not found");
    }

    #[test]
    fn test_store_failure_hides_details() {
        let err: ApiError = OrderlineError::from(StorageError::Connection {
            reason: "password authentication failed for user \"postgres\"".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Database error");
    }

    #[test]
    fn test_identifier_validation_mapping() {
        let err: ApiError = ValidationError::InvalidOrderUidLength {
            len: 3,
            min: 5,
            max: 50,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidOrderId);

        let err: ApiError = ValidationError::EmptyOrderUid.into();
        assert_eq!(err.message, "Order ID not specified");
    }

    #[tokio::test]
    async fn test_response_body_shape() -> Result<(), Box<dyn std::error::Error>> {
        let response = ApiError::order_not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body, serde_json::json!({"error": "Order not found"}));
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::database_error("Connection failed");
        let display = format!("{}", err);
        assert!(display.contains("DatabaseError"));
        assert!(display.contains("Connection failed"));
    }
}
