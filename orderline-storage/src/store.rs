//! Order store trait.
//!
//! The relational schema lives behind this trait. The PostgreSQL
//! implementation is in `orderline-api`; [`crate::MockStore`] backs the tests.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use orderline_core::{Order, OrderlineResult};

/// How `save_order` treats an `order_uid` that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Plain insert. A duplicate fails with `StorageError::ConstraintViolation`.
    Insert,
    /// Insert or replace the whole order (header, delivery, payment, items).
    #[default]
    Upsert,
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMode::Insert => write!(f, "insert"),
            SaveMode::Upsert => write!(f, "upsert"),
        }
    }
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(SaveMode::Insert),
            "upsert" => Ok(SaveMode::Upsert),
            other => Err(format!("unknown save mode '{}', expected insert or upsert", other)),
        }
    }
}

/// Transactional order persistence.
///
/// Implementations must write an order as one unit: header, delivery,
/// payment and every item commit together or not at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a complete order atomically.
    async fn save_order(&self, order: &Order) -> OrderlineResult<()>;

    /// Load an order by identifier.
    ///
    /// Returns `StorageError::NotFound` when no order has this identifier.
    async fn get_order_by_uid(&self, order_uid: &str) -> OrderlineResult<Order>;

    /// Cheap connectivity check used by readiness probes and at boot.
    async fn ping(&self) -> OrderlineResult<()>;
}
