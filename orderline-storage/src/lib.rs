//! ORDERLINE Storage - Store Trait, Mock Store and Order Cache
//!
//! Defines the storage abstraction the service talks to and the in-memory
//! cache that fronts it. The PostgreSQL implementation lives in
//! orderline-api.

pub mod cache;
pub mod mock;
pub mod store;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use cache::{CacheConfig, CacheStats, KeyIndex, OrderCache, RestoreReport, KEY_INDEX_FILE};
pub use mock::MockStore;
pub use store::{OrderStore, SaveMode};
