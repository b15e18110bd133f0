//! Error types for orderline operations

use thiserror::Error;

/// Rejections of an inbound message or a requested order identifier.
///
/// These are always local: the pipeline logs and skips the message, the read
/// path answers with a client error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Unknown field in payload: {field}")]
    UnknownField { field: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid value in payload: {reason}")]
    InvalidValue { reason: String },

    #[error("Empty order_uid")]
    EmptyOrderUid,

    #[error("order_uid is {len} bytes, maximum is {max}")]
    OrderUidTooLong { len: usize, max: usize },

    #[error("Order {order_uid} must contain at least one item")]
    NoItems { order_uid: String },

    #[error("date_created {value} is finer than microsecond precision")]
    SubMicrosecondTimestamp { value: String },

    #[error("Invalid order id length {len}, expected {min}..={max}")]
    InvalidOrderUidLength { len: usize, min: usize, max: usize },
}

/// Store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },

    #[error("Constraint violation for order {order_uid}: {reason}")]
    ConstraintViolation { order_uid: String, reason: String },

    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Failed to decode row for order {order_uid}: {reason}")]
    Decode { order_uid: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Key-index persistence errors raised by the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to write key index {path}: {reason}")]
    IndexWrite { path: String, reason: String },

    #[error("Failed to read key index {path}: {reason}")]
    IndexRead { path: String, reason: String },

    #[error("Key index {path} is not a JSON array of strings: {reason}")]
    IndexDecode { path: String, reason: String },
}

/// Master error type for all orderline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderlineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl OrderlineError {
    /// True when the error is the store's distinguished "absent" result.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderlineError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for orderline operations.
pub type OrderlineResult<T> = Result<T, OrderlineError>;

// =============================================================================
// TESTS
// =============================================================================
