//! Background jobs for the orderline service.
//!
//! - `cache_restore`: rehydrates the order cache from its key index at boot

pub mod cache_restore;

pub use cache_restore::cache_restore_task;
