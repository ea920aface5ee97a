//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL, access
//! bookkeeping and tags.

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Expiry ==
/// Lifetime of an entry.
///
/// `Never` is an explicit sentinel so that a zero duration keeps its literal
/// meaning: `After(Duration::ZERO)` expires as soon as the clock moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Entry never expires
    Never,
    /// Entry expires once this much time has passed since creation
    After(Duration),
}

impl Expiry {
    /// Shorthand for `Expiry::After(Duration::from_millis(ms))`.
    pub fn millis(ms: u64) -> Self {
        Expiry::After(Duration::from_millis(ms))
    }

    /// Returns the lifetime in milliseconds, `None` for `Never`.
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Expiry::Never => None,
            Expiry::After(d) => Some(d.as_millis().min(u64::MAX as u128) as u64),
        }
    }

    fn from_millis(ttl_ms: Option<u64>) -> Self {
        ttl_ms.map_or(Expiry::Never, Expiry::millis)
    }
}

// == Payload ==
/// Stored form of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "value", rename_all = "snake_case")]
pub enum Payload<T> {
    /// Value kept as-is
    Raw(T),
    /// Serialized value passed through the codec
    Compressed(String),
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// The whole entry is what gets mirrored to durable storage, so every field
/// is serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value, possibly compressed
    pub data: Payload<T>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Lifetime in milliseconds, None = no expiration
    pub ttl_ms: Option<u64>,
    /// Number of successful reads
    pub access_count: u64,
    /// Last successful read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Labels used for bulk invalidation
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(data: Payload<T>, ttl: Expiry, tags: BTreeSet<String>) -> Self {
        Self::new_at(data, ttl, tags, current_timestamp_ms())
    }

    /// Creates a new entry stamped with `now`.
    pub fn new_at(data: Payload<T>, ttl: Expiry, tags: BTreeSet<String>, now: u64) -> Self {
        Self {
            data,
            created_at: now,
            ttl_ms: ttl.as_millis(),
            access_count: 0,
            last_accessed_at: now,
            tags,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once strictly more than `ttl_ms` milliseconds have
    /// passed since `created_at`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now.saturating_sub(self.created_at) > ttl,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime at `now`.
    ///
    /// - `Expiry::Never` if the entry has no TTL
    /// - `Expiry::After(ZERO)` if the TTL has fully elapsed
    pub fn ttl_remaining_at(&self, now: u64) -> Expiry {
        match self.ttl() {
            Expiry::After(ttl) => {
                let elapsed = Duration::from_millis(now.saturating_sub(self.created_at));
                Expiry::After(ttl.saturating_sub(elapsed))
            }
            Expiry::Never => Expiry::Never,
        }
    }

    /// Restarts the lifetime at `now` with a new TTL.
    pub fn reset_ttl(&mut self, ttl: Expiry, now: u64) {
        self.created_at = now;
        self.ttl_ms = ttl.as_millis();
    }

    /// Records a successful read.
    pub fn record_access(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.data, Payload::Compressed(_))
    }

    /// Lifetime as an [`Expiry`].
    pub fn ttl(&self) -> Expiry {
        Expiry::from_millis(self.ttl_ms)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
