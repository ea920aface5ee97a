//! Service Module
//!
//! `CacheService` is the handle applications construct at their composition
//! root and pass to consumers. It owns the store behind an async lock and
//! the background TTL cleanup task.
//!
//! # Operations
//! - `get` / `set` / `has` / `delete` / `clear` / `keys` / `values`
//! - `get_by_tag` / `delete_by_tag` / `invalidate_pattern`
//! - `expire` / `get_ttl`
//! - `mget` / `mset` / `memoize` / `warm_cache`
//! - `stats` / `flush` / `destroy`

mod memoize;
mod warm;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{BatchEntry, CacheStats, CacheStore, CacheValue, Expiry, KeyedValue};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::persistence::{FileStorage, Storage};
use crate::tasks::spawn_cleanup_task;

pub use memoize::{KeyFn, Memoized};
pub use warm::WarmupEntry;

// == Cache Service ==
/// Shared handle to a cache.
///
/// Cloning is cheap and every clone sees the same entries. All operations
/// are serialized through one lock, so no caller observes an entry in a
/// half-updated state.
pub struct CacheService<T> {
    cache: Arc<RwLock<CacheStore<T>>>,
    cleanup: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<T> Clone for CacheService<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            cleanup: Arc::clone(&self.cleanup),
        }
    }
}

impl<T: CacheValue + Send + Sync + 'static> CacheService<T> {
    // == Constructors ==
    /// Creates a cache with a process-local persistence mirror and starts
    /// its cleanup task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Ok(Self::from_store(CacheStore::new(config)?))
    }

    /// Creates a cache mirrored to `storage`, restoring persisted entries.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        Ok(Self::from_store(CacheStore::with_storage(config, storage)?))
    }

    /// Creates a cache mirrored to files under `dir`.
    pub fn with_file_storage(config: CacheConfig, dir: impl Into<PathBuf>) -> Result<Self> {
        let storage = FileStorage::open(dir)?;
        Self::with_storage(config, Arc::new(storage))
    }

    fn from_store(store: CacheStore<T>) -> Self {
        let interval = store.config().cleanup_interval;
        let cache = Arc::new(RwLock::new(store));
        let handle = spawn_cleanup_task(&cache, interval);

        Self {
            cache,
            cleanup: Arc::new(Mutex::new(Some(handle))),
        }
    }

    // == Core Operations ==
    pub async fn get(&self, key: &str) -> Option<T> {
        self.cache.write().await.get(key)
    }

    pub async fn set(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Expiry>,
        tags: &[&str],
    ) -> Result<()> {
        self.cache.write().await.set(key, value, ttl, tags)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.cache.write().await.has(key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.cache.write().await.delete(key)
    }

    /// Drops every entry, including the persisted mirror.
    pub async fn clear(&self) {
        self.cache.write().await.clear()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.cache.write().await.keys()
    }

    pub async fn values(&self) -> Vec<T> {
        self.cache.write().await.values()
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    // == Tags & Patterns ==
    pub async fn get_by_tag(&self, tag: &str) -> Vec<KeyedValue<T>> {
        self.cache.write().await.get_by_tag(tag)
    }

    pub async fn delete_by_tag(&self, tag: &str) -> usize {
        self.cache.write().await.delete_by_tag(tag)
    }

    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        self.cache.write().await.invalidate_pattern(pattern)
    }

    // == TTL ==
    pub async fn expire(&self, key: &str, ttl: Expiry) -> bool {
        self.cache.write().await.expire(key, ttl)
    }

    pub async fn get_ttl(&self, key: &str) -> Option<Expiry> {
        self.cache.write().await.get_ttl(key)
    }

    /// Runs one expiry sweep immediately.
    pub async fn cleanup_expired(&self) -> usize {
        self.cache.write().await.cleanup_expired()
    }

    // == Batch ==
    pub async fn mget<S: AsRef<str>>(&self, keys: &[S]) -> Vec<Option<T>> {
        self.cache.write().await.mget(keys)
    }

    pub async fn mset(&self, entries: Vec<BatchEntry<T>>) -> Result<()> {
        self.cache.write().await.mset(entries)
    }

    /// TTL applied when callers pass none.
    pub async fn default_ttl(&self) -> Expiry {
        self.cache.read().await.config().default_ttl
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    // == Flush ==
    /// Waits until every mirror update issued so far has reached storage.
    ///
    /// Cache operations return as soon as memory is updated; the mirror
    /// catches up in the background.
    pub async fn flush(&self) {
        let barrier = self.cache.read().await.persistence_barrier();
        if let Some(done) = barrier {
            if done.await.is_err() {
                warn!("Persistence writer stopped before flushing");
            }
        }
    }

    // == Destroy ==
    /// Stops the cleanup task and drops all in-memory entries.
    ///
    /// Pending mirror updates are flushed. The persisted mirror is kept so a
    /// later instance on the same namespace can restore it; use `clear` to
    /// wipe it.
    pub async fn destroy(&self) {
        if let Some(handle) = self.cleanup.lock().take() {
            handle.abort();
        }
        self.cache.write().await.clear_memory();
        self.flush().await;
        info!("Cache destroyed");
    }

    /// True while the background cleanup task is running.
    pub fn is_sweeping(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::persistence::MemoryStorage;
    use std::time::{Duration, Instant};

    /// Storage whose writes take a long time.
    struct SlowStorage {
        inner: MemoryStorage,
        delay: Duration,
    }

    impl Storage for SlowStorage {
        fn get_item(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
            std::thread::sleep(self.delay);
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> std::result::Result<(), StorageError> {
            std::thread::sleep(self.delay);
            self.inner.remove_item(key)
        }

        fn keys(&self) -> std::result::Result<Vec<String>, StorageError> {
            self.inner.keys()
        }
    }

    fn config(max_size: usize) -> CacheConfig {
        CacheConfig {
            max_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_service_set_get_delete() {
        let cache: CacheService<u32> = CacheService::new(config(10)).unwrap();

        cache.set("a", 1, None, &[]).await.unwrap();

        assert_eq!(cache.get("a").await, Some(1));
        assert!(cache.has("a").await);
        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_service_clones_share_state() {
        let cache: CacheService<String> = CacheService::new(config(10)).unwrap();
        let other = cache.clone();

        cache.set("k", "v".to_string(), None, &[]).await.unwrap();

        assert_eq!(other.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_service_rejects_invalid_config() {
        assert!(CacheService::<u32>::new(config(0)).is_err());
    }

    #[tokio::test]
    async fn test_service_destroy_stops_sweep_and_empties() {
        let cache: CacheService<u32> = CacheService::new(config(10)).unwrap();
        cache.set("a", 1, None, &[]).await.unwrap();
        assert!(cache.is_sweeping());

        cache.destroy().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!cache.is_sweeping());
        assert!(cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_service_persistence_across_instances() {
        let storage = MemoryStorage::new();

        let first: CacheService<u32> =
            CacheService::with_storage(config(10), Arc::new(storage.clone())).unwrap();
        first.set("k", 42, None, &[]).await.unwrap();
        first.destroy().await;

        let second: CacheService<u32> =
            CacheService::with_storage(config(10), Arc::new(storage.clone())).unwrap();

        assert_eq!(second.get("k").await, Some(42));
    }

    #[tokio::test]
    async fn test_service_sweep_runs_in_background() {
        let cache: CacheService<u32> = CacheService::new(CacheConfig {
            cleanup_interval: Duration::from_millis(30),
            ..Default::default()
        })
        .unwrap();

        cache.set("short", 1, Some(Expiry::millis(10)), &[]).await.unwrap();
        cache.set("long", 2, None, &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_service_tags_and_patterns() {
        let cache: CacheService<u32> = CacheService::new(config(10)).unwrap();
        cache.set("user:1", 1, None, &["users"]).await.unwrap();
        cache.set("user:2", 2, None, &["users"]).await.unwrap();
        cache.set("post:1", 3, None, &["posts"]).await.unwrap();

        assert_eq!(cache.get_by_tag("users").await.len(), 2);
        assert_eq!(cache.delete_by_tag("posts").await, 1);
        assert_eq!(
            cache.invalidate_pattern(&Regex::new(r"^user:\d$").unwrap()).await,
            2
        );
        assert!(cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_service_batch_and_ttl() {
        let cache: CacheService<u32> = CacheService::new(config(10)).unwrap();

        cache
            .mset(vec![BatchEntry::new("a", 1), BatchEntry::new("b", 2)])
            .await
            .unwrap();

        assert_eq!(cache.mget(&["a", "b", "c"]).await, vec![Some(1), Some(2), None]);
        assert!(cache.expire("a", Expiry::Never).await);
        assert_eq!(cache.get_ttl("a").await, Some(Expiry::Never));
        assert_eq!(cache.values().await.len(), 2);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_service_writes_do_not_wait_for_storage() {
        let storage = MemoryStorage::new();
        let slow = SlowStorage {
            inner: storage.clone(),
            delay: Duration::from_millis(300),
        };
        let cache: CacheService<u32> =
            CacheService::with_storage(config(10), Arc::new(slow)).unwrap();

        let started = Instant::now();
        cache.set("a", 1, None, &[]).await.unwrap();
        cache.set("b", 2, None, &[]).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(cache.get("a").await, Some(1));

        cache.flush().await;
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_service_destroy_flushes_mirror() {
        let storage = MemoryStorage::new();
        let cache: CacheService<u32> =
            CacheService::with_storage(config(10), Arc::new(storage.clone())).unwrap();

        cache.set("a", 1, None, &[]).await.unwrap();
        cache.destroy().await;

        assert!(storage.get_item("eternyx_cache_a").unwrap().is_some());
    }
}
