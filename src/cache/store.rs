//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, TTL
//! expiration, tags, compression and the persistence mirror.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use regex::Regex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cache::{
    codec, current_timestamp_ms, CacheEntry, CacheStats, CacheValue, Expiry, LruTracker,
    StatsCounters,
};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::persistence::{MemoryStorage, PersistenceAdapter, Storage};

/// A key together with its decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedValue<T> {
    pub key: String,
    pub value: T,
}

/// One write of an `mset` batch.
#[derive(Debug, Clone)]
pub struct BatchEntry<T> {
    pub key: String,
    pub value: T,
    /// None = the configured default TTL
    pub ttl: Option<Expiry>,
    pub tags: Vec<String>,
}

impl<T> BatchEntry<T> {
    pub fn new(key: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
            tags: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Expiry) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

// == Cache Store ==
/// Main cache storage with LRU eviction, TTL support and persistence.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Hit/miss/eviction counters
    stats: StatsCounters,
    config: CacheConfig,
    persistence: PersistenceAdapter,
}

impl<T: CacheValue> CacheStore<T> {
    // == Constructors ==
    /// Creates a store whose persistence mirror lives in process memory.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_storage(config, Arc::new(MemoryStorage::new()))
    }

    /// Creates a store mirroring to `storage`, restoring any unexpired
    /// entries already persisted under the configured namespace.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;

        let persistence = if config.enable_persistence {
            PersistenceAdapter::new(storage, config.namespace.clone())?
        } else {
            PersistenceAdapter::disabled()
        };

        let mut store = Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: StatsCounters::new(),
            config,
            persistence,
        };
        store.restore();
        Ok(store)
    }

    fn restore(&mut self) {
        if !self.persistence.is_enabled() {
            return;
        }

        let loaded = self.persistence.load::<T>(current_timestamp_ms());
        let count = loaded.len();
        for (key, entry) in loaded {
            self.lru.touch(&key);
            self.entries.insert(key, entry);
        }

        while self.entries.len() > self.config.max_size {
            self.evict_lru();
        }

        if count > 0 {
            info!(
                "Restored {} cache entries from namespace {}",
                self.entries.len(),
                self.persistence.namespace()
            );
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Set ==
    /// Stores a value with optional TTL and tags.
    ///
    /// If the key already exists the entry is fully replaced. If the cache is
    /// at capacity and the key is new, expired entries are purged and, if
    /// that frees nothing, the least recently used entry is evicted.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Lifetime; None uses the configured default
    /// * `tags` - Labels for bulk invalidation
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Expiry>,
        tags: &[&str],
    ) -> Result<()> {
        let key = key.into();
        let (payload, serialized_len) =
            codec::encode_payload(value, self.config.compression_threshold_bytes)?;

        let is_overwrite = self.entries.contains_key(&key);
        if !is_overwrite && self.entries.len() >= self.config.max_size {
            self.cleanup_expired();
            if self.entries.len() >= self.config.max_size {
                self.evict_lru();
            }
        }

        let tags: BTreeSet<String> = tags.iter().map(|t| t.to_string()).collect();
        let entry = CacheEntry::new(payload, ttl.unwrap_or(self.config.default_ttl), tags);
        debug!(
            "Set {} ({} bytes, compressed={})",
            key,
            serialized_len,
            entry.is_compressed()
        );

        self.entries.insert(key.clone(), entry);
        if let Some(entry) = self.entries.get(&key) {
            self.persistence.persist(&key, entry);
        }
        self.lru.touch(&key);
        self.count(StatsCounters::record_set);

        Ok(())
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns None if the key is absent or expired. Expired entries are
    /// removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();
        self.purge_if_expired(key, now);

        let Some(entry) = self.entries.get_mut(key) else {
            self.count(StatsCounters::record_miss);
            return None;
        };

        entry.record_access(now);
        match codec::decode_payload(&entry.data) {
            Some(value) => {
                self.lru.touch(key);
                self.count(StatsCounters::record_hit);
                Some(value)
            }
            None => {
                warn!("Dropping undecodable cache entry {}", key);
                self.remove_entry(key);
                self.count(StatsCounters::record_miss);
                None
            }
        }
    }

    // == Has ==
    /// Checks whether a live entry exists, without touching counters or
    /// access bookkeeping.
    pub fn has(&mut self, key: &str) -> bool {
        self.purge_if_expired(key, current_timestamp_ms());
        self.entries.contains_key(key)
    }

    /// Read-only view of an entry, expired or not.
    pub fn peek_entry(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry by key. Returns true iff a live entry existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.purge_if_expired(key, current_timestamp_ms());
        if self.remove_entry(key).is_some() {
            self.count(|s| s.record_deletes(1));
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Drops every entry and wipes the persistence namespace.
    pub fn clear(&mut self) {
        self.clear_memory();
        self.persistence.clear();
    }

    /// Drops every in-memory entry, leaving the persisted mirror in place.
    pub fn clear_memory(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Keys / Values ==
    /// Live keys, least recently used first.
    pub fn keys(&mut self) -> Vec<String> {
        self.cleanup_expired();
        self.lru.keys_oldest_first().cloned().collect()
    }

    /// Live values, least recently used first.
    pub fn values(&mut self) -> Vec<T> {
        self.cleanup_expired();
        self.lru
            .keys_oldest_first()
            .filter_map(|key| self.entries.get(key))
            .filter_map(|entry| codec::decode_payload(&entry.data))
            .collect()
    }

    // == Tags ==
    /// All live entries carrying `tag`.
    pub fn get_by_tag(&mut self, tag: &str) -> Vec<KeyedValue<T>> {
        let now = current_timestamp_ms();
        let matching = self.keys_where(|_, entry| entry.has_tag(tag));

        let mut results = Vec::with_capacity(matching.len());
        for key in matching {
            if self.purge_if_expired(&key, now) {
                continue;
            }
            let value = self
                .entries
                .get(&key)
                .and_then(|entry| codec::decode_payload(&entry.data));
            if let Some(value) = value {
                results.push(KeyedValue { key, value });
            }
        }
        results
    }

    /// Removes every live entry carrying `tag`. Returns the number removed.
    pub fn delete_by_tag(&mut self, tag: &str) -> usize {
        let matching = self.keys_where(|_, entry| entry.has_tag(tag));
        self.remove_live(matching)
    }

    /// Removes every live entry whose key matches `pattern`.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        let matching = self.keys_where(|key, _| pattern.is_match(key));
        self.remove_live(matching)
    }

    // == TTL Management ==
    /// Restarts a live entry's lifetime with a new TTL.
    pub fn expire(&mut self, key: &str, ttl: Expiry) -> bool {
        let now = current_timestamp_ms();
        self.purge_if_expired(key, now);

        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.reset_ttl(ttl, now);
        self.persistence.persist(key, &*entry);
        true
    }

    /// Remaining lifetime of a live entry.
    pub fn get_ttl(&mut self, key: &str) -> Option<Expiry> {
        let now = current_timestamp_ms();
        self.purge_if_expired(key, now);
        self.entries.get(key).map(|entry| entry.ttl_remaining_at(now))
    }

    // == Batch ==
    /// Fans out to `get`.
    pub fn mget<S: AsRef<str>>(&mut self, keys: &[S]) -> Vec<Option<T>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// Fans out to `set`, stopping at the first value that fails to
    /// serialize. Earlier writes of the batch stay applied.
    pub fn mset<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = BatchEntry<T>>,
    {
        for entry in entries {
            let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
            self.set(entry.key, entry.value, entry.ttl, &tags)?;
        }
        Ok(())
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats::derive(
            &self.stats,
            self.entries
                .values()
                .map(|entry| (entry.created_at, codec::stored_len(&entry.data))),
        )
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache and its mirror.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired = self.keys_where(|_, entry| entry.is_expired_at(now));
        let count = expired.len();

        for key in expired {
            self.remove_entry(&key);
        }
        count
    }

    // == Persistence ==
    /// Resolves once every mirror update issued so far has reached storage.
    pub fn persistence_barrier(&self) -> Option<oneshot::Receiver<()>> {
        self.persistence.barrier()
    }

    /// Blocks until every mirror update issued so far has reached storage.
    ///
    /// For synchronous callers only; async code awaits
    /// [`Self::persistence_barrier`] instead.
    pub fn flush(&self) {
        self.persistence.flush()
    }

    // == Length ==
    /// Returns the number of entries physically held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    fn count(&mut self, record: impl FnOnce(&mut StatsCounters)) {
        if self.config.enable_metrics {
            record(&mut self.stats);
        }
    }

    fn keys_where(&self, pred: impl Fn(&str, &CacheEntry<T>) -> bool) -> Vec<String> {
        self.lru
            .keys_oldest_first()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| pred(key.as_str(), entry))
            })
            .cloned()
            .collect()
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.lru.remove(key);
            self.persistence.remove(key);
        }
        removed
    }

    /// Lazy expiry: removes `key` if its entry has expired.
    fn purge_if_expired(&mut self, key: &str, now: u64) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            debug!("Key {} expired", key);
            self.remove_entry(key);
        }
        expired
    }

    /// Removes the given keys, counting only those that were still live.
    fn remove_live(&mut self, keys: Vec<String>) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;
        for key in keys {
            if self.purge_if_expired(&key, now) {
                continue;
            }
            if self.remove_entry(&key).is_some() {
                removed += 1;
            }
        }
        self.count(|s| s.record_deletes(removed));
        removed
    }

    fn evict_lru(&mut self) {
        if let Some(victim) = self.lru.evict_oldest() {
            self.entries.remove(&victim);
            self.persistence.remove(&victim);
            self.count(StatsCounters::record_eviction);
            debug!("Evicted least recently used key {}", victim);
        }
    }
}
