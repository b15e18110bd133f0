//! In-memory order cache with a persisted key index.
//!
//! The cache is the sole owner of both the value map and the key-index file.
//! Readers share the map under the read side of an `RwLock`; insertion takes
//! the write side. The key index is rewritten after every insertion as a
//! second, separately guarded step (see [`KeyIndex`]).
//!
//! A bounded cache also keeps a recency queue of `(stamp, key)` pairs, front
//! oldest. Every access pushes a fresh pair; a pair whose stamp no longer
//! matches its entry is stale and skipped when looking for a victim.
//!
//! Values are never persisted. After a restart [`OrderCache::restore`] reads
//! the index and looks each key up in the store again.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use orderline_core::{CacheError, Order};

use super::key_index::KeyIndex;
use crate::store::OrderStore;

/// Configuration for the order cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the key-index file.
    pub cache_dir: PathBuf,
    /// Maximum number of entries. `None` keeps every entry.
    pub capacity: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache_data"),
            capacity: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key-index directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Bound the cache to `capacity` entries (least recently used evicted).
    /// Zero means unbounded.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = (capacity > 0).then_some(capacity);
        self
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Successful key-index writes.
    pub index_writes: u64,
    /// Failed key-index writes.
    pub index_write_failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Outcome of a rehydration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Keys read from the index.
    pub attempted: usize,
    /// Keys found in the store and cached.
    pub restored: usize,
    /// Keys the store no longer has.
    pub missing: usize,
    /// Keys whose lookup failed with a store error.
    pub failed: usize,
}

#[derive(Debug)]
struct CacheEntry {
    order: Order,
    last_access: AtomicU64,
}

/// Order cache: identifier to order, plus the persisted key index.
#[derive(Debug)]
pub struct OrderCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Only maintained when the cache is bounded. Locked after `entries`.
    recency: Mutex<VecDeque<(u64, String)>>,
    index: KeyIndex,
    config: CacheConfig,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    index_writes: AtomicU64,
    index_write_failures: AtomicU64,
}

impl OrderCache {
    /// Create an empty cache whose key index lives in `config.cache_dir`.
    ///
    /// The directory is created if missing. Failure to create it is logged;
    /// the cache still serves reads and reports the problem on the next
    /// index write.
    pub fn new(config: CacheConfig) -> Self {
        if let Err(e) = std::fs::create_dir_all(&config.cache_dir) {
            tracing::warn!(
                error = %e,
                cache_dir = %config.cache_dir.display(),
                "Failed to create cache directory"
            );
        }

        Self {
            entries: RwLock::new(HashMap::new()),
            recency: Mutex::new(VecDeque::new()),
            index: KeyIndex::in_dir(&config.cache_dir),
            config,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            index_writes: AtomicU64::new(0),
            index_write_failures: AtomicU64::new(0),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the key index.
    pub fn key_index(&self) -> &KeyIndex {
        &self.index
    }

    /// Look up an order. Returns an owned copy.
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        let entries = self.read_entries();
        match entries.get(order_uid) {
            Some(entry) => {
                let stamp = self.tick();
                entry.last_access.fetch_max(stamp, Ordering::Relaxed);
                if self.config.capacity.is_some() {
                    let mut recency = self.lock_recency();
                    recency.push_back((stamp, order_uid.to_string()));
                    if recency.len() > 2 * entries.len() + RECENCY_SLACK {
                        recency.retain(|(queued, key)| is_current(&entries, key, *queued));
                    }
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.order.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite an order, then record the key set in the index.
    ///
    /// The in-memory insertion always succeeds. An error means only the
    /// index write failed: the order is cached but will not be rehydrated
    /// after a restart.
    pub async fn set(&self, order: Order) -> Result<(), CacheError> {
        let order_uid = order.order_uid.clone();
        self.insert_entry(order);

        match self.index.persist_with(|| self.keys()).await {
            Ok(written) => {
                self.index_writes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(order_uid = %order_uid, keys = written, "Order cached");
                Ok(())
            }
            Err(e) => {
                self.index_write_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Rehydrate the cache from the key index.
    ///
    /// Every persisted key is looked up in the store. Missing orders and
    /// store errors are logged and skipped; only an unreadable index fails
    /// the whole pass. The index itself is not rewritten.
    pub async fn restore<S>(&self, store: &S) -> Result<RestoreReport, CacheError>
    where
        S: OrderStore + ?Sized,
    {
        let keys = self.index.load().await?;
        let mut report = RestoreReport {
            attempted: keys.len(),
            ..RestoreReport::default()
        };

        for key in keys {
            tracing::debug!(order_uid = %key, "Restoring order from store");
            match store.get_order_by_uid(&key).await {
                Ok(order) => {
                    self.insert_entry(order);
                    report.restored += 1;
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(order_uid = %key, "Indexed order no longer in store");
                    report.missing += 1;
                }
                Err(e) => {
                    tracing::warn!(order_uid = %key, error = %e, "Failed to restore order");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            restored = report.restored,
            missing = report.missing,
            failed = report.failed,
            "Cache restored from key index"
        );
        Ok(report)
    }

    /// Number of cached orders.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the cache holds no orders.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Whether an order is cached, without touching hit/miss counters.
    pub fn contains(&self, order_uid: &str) -> bool {
        self.read_entries().contains_key(order_uid)
    }

    /// Cached identifiers, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read_entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
            index_writes: self.index_writes.load(Ordering::Relaxed),
            index_write_failures: self.index_write_failures.load(Ordering::Relaxed),
        }
    }

    fn insert_entry(&self, order: Order) {
        let mut entries = self.write_entries();
        let stamp = self.tick();
        let order_uid = order.order_uid.clone();
        entries.insert(
            order_uid.clone(),
            CacheEntry {
                order,
                last_access: AtomicU64::new(stamp),
            },
        );

        let Some(capacity) = self.config.capacity else {
            return;
        };
        let mut recency = self.lock_recency();
        recency.push_back((stamp, order_uid));
        while entries.len() > capacity {
            let Some((stamp, key)) = recency.pop_front() else {
                break;
            };
            if !is_current(&entries, &key, stamp) {
                continue;
            }
            entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(order_uid = %key, "Evicted least recently used order");
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    // A panic while holding the lock cannot leave a half-inserted entry,
    // so a poisoned map is still usable.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_recency(&self) -> MutexGuard<'_, VecDeque<(u64, String)>> {
        self.recency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn recency_len(&self) -> usize {
        self.lock_recency().len()
    }
}

/// Stale queue pairs tolerated beyond twice the entry count before compaction.
const RECENCY_SLACK: usize = 64;

fn is_current(entries: &HashMap<String, CacheEntry>, key: &str, stamp: u64) -> bool {
    entries
        .get(key)
        .is_some_and(|entry| entry.last_access.load(Ordering::Relaxed) == stamp)
}
