//! Cache Statistics Module
//!
//! Tracks cache performance counters and builds derived snapshots.

use serde::Serialize;

// == Stats Counters ==
/// The only statistics stored incrementally.
#[derive(Debug, Clone, Default)]
pub struct StatsCounters {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Number of writes
    pub sets: u64,
    /// Number of entries removed explicitly (by key, tag or pattern)
    pub deletes: u64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    // == Rates ==
    /// Calculates hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculates misses / (hits + misses), or 0.0 if no reads have been made.
    pub fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_deletes(&mut self, count: usize) {
        self.deletes += count as u64;
    }
}

// == Cache Stats ==
/// Point-in-time view of the cache.
///
/// Everything except the counters is derived from the live entries when the
/// snapshot is taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Approximate serialized size of all stored payloads in bytes
    pub total_size: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub eviction_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Creation time of the oldest entry (Unix milliseconds)
    pub oldest_entry: Option<u64>,
    /// Creation time of the newest entry (Unix milliseconds)
    pub newest_entry: Option<u64>,
}

impl CacheStats {
    /// Builds a snapshot from counters and per-entry `(created_at, size)` pairs.
    pub fn derive<I>(counters: &StatsCounters, entries: I) -> Self
    where
        I: IntoIterator<Item = (u64, usize)>,
    {
        let mut total_entries = 0;
        let mut total_size = 0;
        let mut oldest_entry: Option<u64> = None;
        let mut newest_entry: Option<u64> = None;

        for (created_at, size) in entries {
            total_entries += 1;
            total_size += size;
            oldest_entry = Some(oldest_entry.map_or(created_at, |t| t.min(created_at)));
            newest_entry = Some(newest_entry.map_or(created_at, |t| t.max(created_at)));
        }

        Self {
            total_entries,
            total_size,
            hit_rate: counters.hit_rate(),
            miss_rate: counters.miss_rate(),
            eviction_count: counters.evictions,
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            oldest_entry,
            newest_entry,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_new() {
        let counters = StatsCounters::new();
        assert_eq!(counters.hits, 0);
        assert_eq!(counters.misses, 0);
        assert_eq!(counters.evictions, 0);
        assert_eq!(counters.hit_rate(), 0.0);
        assert_eq!(counters.miss_rate(), 0.0);
    }

    #[test]
    fn test_rates_mixed() {
        let mut counters = StatsCounters::new();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();

        assert_eq!(counters.hit_rate(), 0.75);
        assert_eq!(counters.miss_rate(), 0.25);
    }

    #[test]
    fn test_record_eviction_and_deletes() {
        let mut counters = StatsCounters::new();
        counters.record_eviction();
        counters.record_eviction();
        counters.record_deletes(3);
        counters.record_set();

        assert_eq!(counters.evictions, 2);
        assert_eq!(counters.deletes, 3);
        assert_eq!(counters.sets, 1);
    }

    #[test]
    fn test_derive_empty() {
        let stats = CacheStats::derive(&StatsCounters::new(), Vec::new());

        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.oldest_entry, None);
        assert_eq!(stats.newest_entry, None);
    }

    #[test]
    fn test_derive_entries() {
        let mut counters = StatsCounters::new();
        counters.record_hit();
        counters.record_eviction();

        let stats = CacheStats::derive(&counters, vec![(300, 10), (100, 5), (200, 1)]);

        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_size, 16);
        assert_eq!(stats.oldest_entry, Some(100));
        assert_eq!(stats.newest_entry, Some(300));
        assert_eq!(stats.eviction_count, 1);
        assert_eq!(stats.hit_rate, 1.0);
    }
}
