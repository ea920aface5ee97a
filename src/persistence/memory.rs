//! In-process storage backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Storage;
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
    unavailable: bool,
}

impl Inner {
    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

// == Memory Storage ==
/// Shared in-memory [`Storage`].
///
/// Clones share the same items, so two caches built on clones of one
/// `MemoryStorage` behave like two instances backed by the same durable
/// store. An optional byte quota and an availability switch make storage
/// failures reproducible.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once keys and values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::default();
        storage.inner.lock().quota_bytes = Some(bytes);
        storage
    }

    /// Makes every operation fail with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }

        if let Some(quota) = inner.quota_bytes {
            let used = inner.used_bytes_excluding(key);
            let needed = key.len() + value.len();
            if used + needed > quota {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }
        inner.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return Err(StorageError::Unavailable);
        }
        Ok(inner.items.keys().cloned().collect())
    }
}
