//! In-memory [`OrderStore`] for tests.
//!
//! Counts every call so tests can assert whether the store was reached, and
//! can be switched into failure modes to exercise error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use orderline_core::{Order, OrderlineResult, StorageError};

use crate::store::{OrderStore, SaveMode};

/// Mock order store backed by a `HashMap`.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
    mode: SaveMode,
    save_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
    fail_gets: Arc<AtomicBool>,
}

impl MockStore {
    /// Create an empty mock store with upsert semantics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mock store with the given save mode.
    pub fn with_mode(mode: SaveMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Put an order straight into the store without counting a call.
    pub fn seed(&self, order: Order) -> OrderlineResult<()> {
        let mut orders = self.orders.write().map_err(|_| StorageError::LockPoisoned)?;
        orders.insert(order.order_uid.clone(), order);
        Ok(())
    }

    /// Number of stored orders.
    pub fn order_count(&self) -> usize {
        self.orders.read().map(|orders| orders.len()).unwrap_or(0)
    }

    /// Whether an order with this identifier is stored.
    pub fn contains(&self, order_uid: &str) -> bool {
        self.orders
            .read()
            .map(|orders| orders.contains_key(order_uid))
            .unwrap_or(false)
    }

    /// Number of `save_order` calls so far.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_order_by_uid` calls so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent `save_order` fail with a transaction error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get_order_by_uid` and `ping` fail with a
    /// connection error.
    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for MockStore {
    async fn save_order(&self, order: &Order) -> OrderlineResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::TransactionFailed {
                reason: "injected save failure".to_string(),
            }
            .into());
        }

        let mut orders = self.orders.write().map_err(|_| StorageError::LockPoisoned)?;
        if self.mode == SaveMode::Insert && orders.contains_key(&order.order_uid) {
            return Err(StorageError::ConstraintViolation {
                order_uid: order.order_uid.clone(),
                reason: "duplicate key value violates unique constraint \"orders_pkey\""
                    .to_string(),
            }
            .into());
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn get_order_by_uid(&self, order_uid: &str) -> OrderlineResult<Order> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::Connection {
                reason: "injected connection failure".to_string(),
            }
            .into());
        }

        let orders = self.orders.read().map_err(|_| StorageError::LockPoisoned)?;
        orders.get(order_uid).cloned().ok_or_else(|| {
            StorageError::NotFound {
                order_uid: order_uid.to_string(),
            }
            .into()
        })
    }

    async fn ping(&self) -> OrderlineResult<()> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::Connection {
                reason: "injected connection failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::order;
    use orderline_core::OrderlineError;

    #[tokio::test]
    async fn test_save_then_get_round_trip() -> OrderlineResult<()> {
        let store = MockStore::new();
        let original = order("A1000");
        store.save_order(&original).await?;

        let fetched = store.get_order_by_uid("A1000").await?;
        assert_eq!(fetched, original);
        assert_eq!(store.save_calls(), 1);
        assert_eq!(store.get_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let store = MockStore::new();
        let err = store.get_order_by_uid("NOPE0").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_insert_mode_rejects_duplicates() -> OrderlineResult<()> {
        let store = MockStore::with_mode(SaveMode::Insert);
        store.save_order(&order("A1000")).await?;

        let err = store.save_order(&order("A1000")).await.unwrap_err();
        assert!(matches!(
            err,
            OrderlineError::Storage(StorageError::ConstraintViolation { .. })
        ));
        assert_eq!(store.order_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_mode_replaces() -> OrderlineResult<()> {
        let store = MockStore::new();
        store.save_order(&order("A1000")).await?;

        let mut changed = order("A1000");
        changed.locale = "ru".to_string();
        store.save_order(&changed).await?;

        assert_eq!(store.order_count(), 1);
        assert_eq!(store.get_order_by_uid("A1000").await?.locale, "ru");
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failures() -> OrderlineResult<()> {
        let store = MockStore::new();
        store.seed(order("A1000"))?;

        store.set_fail_gets(true);
        let err = store.get_order_by_uid("A1000").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(store.ping().await.is_err());

        store.set_fail_saves(true);
        assert!(store.save_order(&order("B2000")).await.is_err());
        assert!(!store.contains("B2000"));
        Ok(())
    }
}
