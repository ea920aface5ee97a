//! Configuration Module
//!
//! Handles loading and validating cache configuration.

use std::env;
use std::time::Duration;

use crate::cache::Expiry;
use crate::error::{CacheError, Result};

/// Default persistence key prefix.
pub const DEFAULT_NAMESPACE: &str = "eternyx_cache_";

/// Cache configuration parameters.
///
/// Supplied once at construction; there is no runtime reconfiguration beyond
/// per-entry `expire`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// Lifetime applied when `set` is called without an explicit TTL
    pub default_ttl: Expiry,
    /// Period of the background expiry sweep
    pub cleanup_interval: Duration,
    /// Serialized size above which values are compressed
    pub compression_threshold_bytes: usize,
    /// Mirror writes to durable storage
    pub enable_persistence: bool,
    /// Collect hit/miss/eviction counters
    pub enable_metrics: bool,
    /// Prefix for every persisted key
    pub namespace: String,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in ms, or `never` (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep period in ms (default: 60000)
    /// - `CACHE_COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 10000)
    /// - `CACHE_ENABLE_PERSISTENCE` - `true`/`false` (default: true)
    /// - `CACHE_ENABLE_METRICS` - `true`/`false` (default: true)
    /// - `CACHE_NAMESPACE` - Persistence key prefix (default: `eternyx_cache_`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size: parse_var("CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            default_ttl: env::var("CACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| parse_expiry(&v))
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: parse_var("CACHE_CLEANUP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            compression_threshold_bytes: parse_var("CACHE_COMPRESSION_THRESHOLD")
                .unwrap_or(defaults.compression_threshold_bytes),
            enable_persistence: parse_var("CACHE_ENABLE_PERSISTENCE")
                .unwrap_or(defaults.enable_persistence),
            enable_metrics: parse_var("CACHE_ENABLE_METRICS")
                .unwrap_or(defaults.enable_metrics),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
        }
    }

    // == Validate ==
    /// Rejects configurations the cache cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval must be greater than zero".to_string(),
            ));
        }
        if self.enable_persistence && self.namespace.is_empty() {
            return Err(CacheError::InvalidConfig(
                "namespace must not be empty when persistence is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl: Expiry::After(Duration::from_secs(5 * 60)),
            cleanup_interval: Duration::from_secs(60),
            compression_threshold_bytes: 10_000,
            enable_persistence: true,
            enable_metrics: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

fn parse_var<V: std::str::FromStr>(name: &str) -> Option<V> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parses a TTL in milliseconds; `never` disables expiry.
pub fn parse_expiry(raw: &str) -> Option<Expiry> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("never") {
        return Some(Expiry::Never);
    }
    raw.parse::<u64>()
        .ok()
        .map(|ms| Expiry::After(Duration::from_millis(ms)))
}
