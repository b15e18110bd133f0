//! Order cache engine.
//!
//! [`OrderCache`] maps order identifiers to orders in memory and persists
//! only the *set of keys* through [`KeyIndex`], so that a restarted process
//! can look the same orders up in the store again.

pub mod engine;
pub mod key_index;

pub use engine::{CacheConfig, CacheStats, OrderCache, RestoreReport};
pub use key_index::{KeyIndex, KEY_INDEX_FILE};
