//! Persistence Module
//!
//! Best-effort mirror of cache entries to a durable key-value store.
//!
//! Every write is namespaced (`<namespace><cache key>`) and holds the JSON of
//! the full entry. Updates are queued to a background writer once the cache
//! has committed them in memory. Failures are logged and swallowed: the
//! in-memory cache stays correct whether or not the mirror succeeds.
//!
//! Instances sharing a namespace are not coordinated; the last writer wins.

mod file;
mod memory;
mod writer;

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::error::StorageError;
use writer::{MirrorOp, MirrorWriter};

pub use file::FileStorage;
pub use memory::MemoryStorage;

// == Storage Trait ==
/// A durable string-to-string store.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    /// Every key currently held, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

struct Mirror {
    storage: Arc<dyn Storage>,
    writer: MirrorWriter,
}

// == Persistence Adapter ==
/// Mirrors cache mutations into a [`Storage`] under a namespace.
pub struct PersistenceAdapter {
    mirror: Option<Mirror>,
    namespace: String,
}

impl fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("enabled", &self.is_enabled())
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl PersistenceAdapter {
    /// Creates an adapter writing to `storage` under `namespace`.
    ///
    /// Starts the background writer thread.
    pub fn new(
        storage: Arc<dyn Storage>,
        namespace: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let writer = MirrorWriter::spawn(Arc::clone(&storage))?;
        Ok(Self {
            mirror: Some(Mirror { storage, writer }),
            namespace: namespace.into(),
        })
    }

    /// An adapter that ignores every call.
    pub fn disabled() -> Self {
        Self {
            mirror: None,
            namespace: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mirror.is_some()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    // == Persist ==
    /// Queues an entry write.
    pub fn persist<T: Serialize>(&self, key: &str, entry: &CacheEntry<T>) {
        let Some(mirror) = &self.mirror else {
            return;
        };

        match serde_json::to_string(entry) {
            Ok(json) => mirror.writer.submit(MirrorOp::Write {
                key: self.storage_key(key),
                json,
            }),
            Err(e) => warn!("Cache persistence failed for key {}: {}", key, e),
        }
    }

    // == Remove ==
    /// Queues removal of an entry.
    pub fn remove(&self, key: &str) {
        if let Some(mirror) = &self.mirror {
            mirror.writer.submit(MirrorOp::Remove {
                key: self.storage_key(key),
            });
        }
    }

    // == Clear ==
    /// Queues removal of every mirrored entry in this namespace.
    pub fn clear(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.writer.submit(MirrorOp::Clear {
                prefix: self.namespace.clone(),
            });
        }
    }

    // == Flush ==
    /// Resolves once every update queued so far has reached storage.
    pub fn barrier(&self) -> Option<oneshot::Receiver<()>> {
        self.mirror.as_ref().map(|mirror| mirror.writer.barrier())
    }

    /// Blocks until every update queued so far has reached storage.
    ///
    /// Must not be called from async code; await [`Self::barrier`] there.
    pub fn flush(&self) {
        if let Some(done) = self.barrier() {
            if done.blocking_recv().is_err() {
                warn!("Persistence writer stopped before flushing");
            }
        }
    }

    // == Load ==
    /// Reads back every unexpired entry in this namespace.
    ///
    /// Expired or undecodable records are queued for deletion. Results are
    /// ordered from least to most recently accessed, ties broken by key.
    pub fn load<T: DeserializeOwned>(&self, now: u64) -> Vec<(String, CacheEntry<T>)> {
        let Some(mirror) = &self.mirror else {
            return Vec::new();
        };
        let storage = mirror.storage.as_ref();

        let keys = match storage.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.namespace))
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!("Cache persistence loading failed: {}", e);
                return Vec::new();
            }
        };

        let mut loaded = Vec::new();
        let mut dropped = 0usize;

        for storage_key in keys {
            let cache_key = storage_key[self.namespace.len()..].to_string();

            let raw = match storage.get_item(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Cache persistence read failed for key {}: {}", cache_key, e);
                    continue;
                }
            };

            match serde_json::from_str::<CacheEntry<T>>(&raw) {
                Ok(entry) if !entry.is_expired_at(now) => loaded.push((cache_key, entry)),
                Ok(_) => {
                    dropped += 1;
                    mirror.writer.submit(MirrorOp::Remove { key: storage_key });
                }
                Err(e) => {
                    warn!("Discarding unreadable persisted entry {}: {}", cache_key, e);
                    dropped += 1;
                    mirror.writer.submit(MirrorOp::Remove { key: storage_key });
                }
            }
        }

        loaded.sort_by(|(ka, a), (kb, b)| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then_with(|| ka.cmp(kb))
        });

        debug!(
            "Loaded {} persisted entries from namespace {}, dropped {}",
            loaded.len(),
            self.namespace,
            dropped
        );
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Expiry, Payload};
    use std::collections::BTreeSet;

    fn entry_at(value: u32, ttl: Expiry, now: u64) -> CacheEntry<u32> {
        CacheEntry::new_at(Payload::Raw(value), ttl, BTreeSet::new(), now)
    }

    #[test]
    fn test_persist_and_load() {
        let storage = MemoryStorage::new();
        let adapter = PersistenceAdapter::new(Arc::new(storage.clone()), "ns_").unwrap();

        adapter.persist("a", &entry_at(1, Expiry::Never, 100));
        adapter.persist("b", &entry_at(2, Expiry::Never, 50));
        adapter.flush();

        assert!(storage.get_item("ns_a").unwrap().is_some());

        let loaded: Vec<(String, CacheEntry<u32>)> = adapter.load(1_000);
        let keys: Vec<&str> = loaded.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(loaded[1].1.data, Payload::Raw(1));
    }

    #[test]
    fn test_load_drops_expired_records() {
        let storage = MemoryStorage::new();
        let adapter = PersistenceAdapter::new(Arc::new(storage.clone()), "ns_").unwrap();

        adapter.persist("stale", &entry_at(1, Expiry::millis(10), 100));
        adapter.persist("fresh", &entry_at(2, Expiry::millis(10_000), 100));

        let loaded: Vec<(String, CacheEntry<u32>)> = adapter.load(500);
        adapter.flush();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "fresh");
        assert!(storage.get_item("ns_stale").unwrap().is_none());
    }

    #[test]
    fn test_load_drops_unreadable_records() {
        let storage = MemoryStorage::new();
        storage.set_item("ns_junk", "{not json").unwrap();
        let adapter = PersistenceAdapter::new(Arc::new(storage.clone()), "ns_").unwrap();

        let loaded: Vec<(String, CacheEntry<u32>)> = adapter.load(0);
        adapter.flush();

        assert!(loaded.is_empty());
        assert!(storage.get_item("ns_junk").unwrap().is_none());
    }

    #[test]
    fn test_clear_only_touches_namespace() {
        let storage = MemoryStorage::new();
        storage.set_item("other_x", "keep").unwrap();
        let adapter = PersistenceAdapter::new(Arc::new(storage.clone()), "ns_").unwrap();
        adapter.persist("a", &entry_at(1, Expiry::Never, 0));

        adapter.clear();
        adapter.flush();

        assert!(storage.get_item("ns_a").unwrap().is_none());
        assert_eq!(storage.get_item("other_x").unwrap().as_deref(), Some("keep"));
    }

    #[test]
    fn test_failures_are_swallowed() {
        let storage = MemoryStorage::new();
        storage.set_unavailable(true);
        let adapter = PersistenceAdapter::new(Arc::new(storage.clone()), "ns_").unwrap();

        adapter.persist("a", &entry_at(1, Expiry::Never, 0));
        adapter.remove("a");
        adapter.clear();
        adapter.flush();
        let loaded: Vec<(String, CacheEntry<u32>)> = adapter.load(0);

        assert!(loaded.is_empty());
    }

    #[test]
    fn test_disabled_adapter_is_inert() {
        let adapter = PersistenceAdapter::disabled();
        adapter.persist("a", &entry_at(1, Expiry::Never, 0));

        adapter.flush();

        assert!(!adapter.is_enabled());
        assert!(adapter.barrier().is_none());
        assert!(adapter.load::<u32>(0).is_empty());
    }
}
