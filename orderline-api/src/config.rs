//! Service Configuration Module
//!
//! Every setting comes from an `ORDERLINE_*` environment variable with a
//! default from [`crate::constants`]. A variable that is set but cannot be
//! parsed is a startup error, never silently replaced by the default.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use orderline_storage::CacheConfig;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CACHE_DIR, DEFAULT_PORT, DEFAULT_SHUTDOWN_GRACE_SECS,
};
use crate::db::DbConfig;
use crate::error::{ApiError, ApiResult};
use crate::ingest::IngestConfig;

// ============================================================================
// ENVIRONMENT HELPERS
// ============================================================================

/// Parse `key` if present, otherwise return `default`.
pub(crate) fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> ApiResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid value for {}: '{}' ({})", key, raw, e))
        }),
        None => Ok(default),
    }
}

/// Parse a boolean flag accepting true/false/1/0/yes/no.
pub(crate) fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> ApiResult<bool> {
    match lookup(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
        Some(v) => Err(ApiError::invalid_input(format!(
            "Invalid value for {}: '{}' (expected true or false)",
            key, v
        ))),
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,
    /// TCP port.
    pub port: u16,
    /// How long in-flight requests may drain after shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ORDERLINE_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `ORDERLINE_API_PORT`: Port (default: 8080)
    /// - `ORDERLINE_SHUTDOWN_GRACE_SECS`: Drain period (default: 5)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let bind_host = lookup("ORDERLINE_API_BIND").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());

        let port_key = if lookup("PORT").is_some() {
            "PORT"
        } else {
            "ORDERLINE_API_PORT"
        };
        let port = parse_var(lookup, port_key, DEFAULT_PORT)?;

        let grace_secs = parse_var(
            lookup,
            "ORDERLINE_SHUTDOWN_GRACE_SECS",
            DEFAULT_SHUTDOWN_GRACE_SECS,
        )?;

        Ok(Self {
            bind_host,
            port,
            shutdown_grace: Duration::from_secs(grace_secs),
        })
    }

    /// Socket address to listen on. The host is an IPv4 or IPv6 literal,
    /// optionally bracketed (`[::1]`).
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let host = self.bind_host.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let ip = host.parse::<IpAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind host {}: {}", self.bind_host, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Read the cache settings.
///
/// Environment variables:
/// - `ORDERLINE_CACHE_DIR`: Key-index directory (default: ./cache_data)
/// - `ORDERLINE_CACHE_CAPACITY`: Maximum entries, unset or 0 = unbounded
pub fn cache_config_from_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
) -> ApiResult<CacheConfig> {
    let cache_dir = lookup("ORDERLINE_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    let capacity = parse_var(lookup, "ORDERLINE_CACHE_CAPACITY", 0usize)?;

    Ok(CacheConfig::new()
        .with_cache_dir(cache_dir)
        .with_capacity(capacity))
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Everything the binary needs at boot.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api: ApiConfig,
    pub db: DbConfig,
    pub cache: CacheConfig,
    pub ingest: IngestConfig,
}

impl ServiceConfig {
    /// Load the full configuration from the process environment.
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        Ok(Self {
            api: ApiConfig::from_lookup(lookup)?,
            db: DbConfig::from_lookup(lookup)?,
            cache: cache_config_from_lookup(lookup)?,
            ingest: IngestConfig::from_lookup(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() -> ApiResult<()> {
        let config = ServiceConfig::from_lookup(&vars(&[]))?;
        assert_eq!(config.api, ApiConfig::default());
        assert_eq!(config.api.bind_addr()?.port(), 8080);
        assert_eq!(config.cache.cache_dir, PathBuf::from("./cache_data"));
        assert_eq!(config.cache.capacity, None);
        Ok(())
    }

    #[test]
    fn test_port_prefers_plain_port() -> ApiResult<()> {
        let config = ApiConfig::from_lookup(&vars(&[
            ("PORT", "9000"),
            ("ORDERLINE_API_PORT", "9001"),
        ]))?;
        assert_eq!(config.port, 9000);

        let config = ApiConfig::from_lookup(&vars(&[("ORDERLINE_API_PORT", "9001")]))?;
        assert_eq!(config.port, 9001);
        Ok(())
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = ApiConfig::from_lookup(&vars(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.message.contains("PORT"));
    }

    #[test]
    fn test_ipv6_bind_host() -> ApiResult<()> {
        for host in ["::", "[::]"] {
            let config = ApiConfig::from_lookup(&vars(&[
                ("ORDERLINE_API_BIND", host),
                ("ORDERLINE_API_PORT", "9001"),
            ]))?;
            let addr = config.bind_addr()?;
            assert!(addr.is_ipv6(), "{}", host);
            assert_eq!(addr.to_string(), "[::]:9001");
        }

        let config = ApiConfig::from_lookup(&vars(&[("ORDERLINE_API_BIND", "::1")]))?;
        assert_eq!(config.bind_addr()?.ip(), IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
        Ok(())
    }

    #[test]
    fn test_invalid_bind_host_is_error() -> ApiResult<()> {
        let config = ApiConfig::from_lookup(&vars(&[("ORDERLINE_API_BIND", "not a host")]))?;
        assert!(config.bind_addr().is_err());
        Ok(())
    }

    #[test]
    fn test_cache_capacity() -> ApiResult<()> {
        let cache = cache_config_from_lookup(&vars(&[
            ("ORDERLINE_CACHE_DIR", "/var/lib/orderline"),
            ("ORDERLINE_CACHE_CAPACITY", "500"),
        ]))?;
        assert_eq!(cache.cache_dir, PathBuf::from("/var/lib/orderline"));
        assert_eq!(cache.capacity, Some(500));

        let cache = cache_config_from_lookup(&vars(&[("ORDERLINE_CACHE_CAPACITY", "0")]))?;
        assert_eq!(cache.capacity, None);
        Ok(())
    }

    #[test]
    fn test_parse_flag() -> ApiResult<()> {
        assert!(parse_flag(&vars(&[("F", "YES")]), "F", false)?);
        assert!(!parse_flag(&vars(&[("F", "0")]), "F", true)?);
        assert!(parse_flag(&vars(&[]), "F", true)?);
        assert!(parse_flag(&vars(&[("F", "maybe")]), "F", true).is_err());
        Ok(())
    }
}
