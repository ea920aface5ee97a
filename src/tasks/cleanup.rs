//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::{CacheStore, CacheValue};

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task holds only a weak reference to the store, so it ends on its own
/// once every owner of the store is gone. Owners that want it stopped sooner
/// abort the returned handle.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::<String>::new(config)?));
/// let cleanup_handle = spawn_cleanup_task(&cache, Duration::from_secs(60));
/// // Later, during teardown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<T>(
    cache: &Arc<RwLock<CacheStore<T>>>,
    interval: Duration,
) -> JoinHandle<()>
where
    T: CacheValue + Send + Sync + 'static,
{
    let cache: Weak<RwLock<CacheStore<T>>> = Arc::downgrade(cache);

    tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping TTL cleanup task");
                break;
            };

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.cleanup_expired()
            };

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
