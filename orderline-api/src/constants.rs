//! Constants for the orderline API
//!
//! Defaults for every environment-driven setting live here so the config
//! constructors and their tests agree on them.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default time allowed for in-flight requests to drain on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

// ============================================================================
// DATABASE
// ============================================================================

/// Default PostgreSQL host
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default PostgreSQL port
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database name
pub const DEFAULT_DB_NAME: &str = "orders_db";

/// Default database user
pub const DEFAULT_DB_USER: &str = "postgres";

/// Default maximum pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 16;

/// Default connection timeout in seconds
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// CACHE
// ============================================================================

/// Default key-index directory
pub const DEFAULT_CACHE_DIR: &str = "./cache_data";

// ============================================================================
// INGESTION
// ============================================================================

/// Default bound of the in-process message channel
pub const DEFAULT_INGEST_CHANNEL_CAPACITY: usize = 1024;

/// Default pause before retrying a failed receive (milliseconds)
pub const DEFAULT_INGEST_RECV_BACKOFF_MS: u64 = 250;

// ============================================================================
// LOGGING
// ============================================================================

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str =
    "orderline_api=debug,orderline_storage=debug,tower_http=info,info";
