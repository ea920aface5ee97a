//! Cache warming: populate entries from concurrent producers.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use super::CacheService;
use crate::cache::{CacheValue, Expiry};

// == Warmup Entry ==
/// A key and the async producer of its value.
pub struct WarmupEntry<'a, T> {
    pub key: String,
    pub producer: BoxFuture<'a, anyhow::Result<T>>,
    /// None = the configured default TTL
    pub ttl: Option<Expiry>,
}

impl<'a, T> WarmupEntry<'a, T> {
    pub fn new<Fut>(key: impl Into<String>, producer: Fut) -> Self
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'a,
    {
        Self {
            key: key.into(),
            producer: Box::pin(producer),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Expiry) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl<T: CacheValue + Send + Sync + 'static> CacheService<T> {
    // == Warm Cache ==
    /// Runs every producer concurrently and stores each result as it
    /// resolves.
    ///
    /// A failing producer is logged and skipped; the others still populate.
    /// Returns the number of entries written.
    pub async fn warm_cache(&self, entries: Vec<WarmupEntry<'_, T>>) -> usize {
        let total = entries.len();
        let mut pending: FuturesUnordered<_> = entries
            .into_iter()
            .map(|entry| async move {
                let WarmupEntry { key, producer, ttl } = entry;
                (key, ttl, producer.await)
            })
            .collect();

        let mut populated = 0;
        while let Some((key, ttl, result)) = pending.next().await {
            let value = match result {
                Ok(value) => value,
                Err(e) => {
                    warn!("Cache warming failed for key {}: {:#}", key, e);
                    continue;
                }
            };

            match self.set(key.as_str(), value, ttl, &[]).await {
                Ok(()) => populated += 1,
                Err(e) => warn!("Cache warming could not store key {}: {}", key, e),
            }
        }

        info!("Cache warming populated {}/{} entries", populated, total);
        populated
    }
}
