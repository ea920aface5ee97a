//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU eviction, tags and
//! transparent compression.

pub mod codec;
mod entry;
mod lru;
mod stats;
mod store;


use serde::{de::DeserializeOwned, Serialize};

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, Expiry, Payload};
pub use lru::LruTracker;
pub use stats::{CacheStats, StatsCounters};
pub use store::{BatchEntry, CacheStore, KeyedValue};

/// Bounds shared by every cached value type.
///
/// Values cross a serialization boundary on every write (for compression
/// and persistence), so they must round-trip through serde.
pub trait CacheValue: Serialize + DeserializeOwned + Clone {}

impl<T: Serialize + DeserializeOwned + Clone> CacheValue for T {}
