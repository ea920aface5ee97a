//! Mini Cache - a client-side cache library
//!
//! Provides TTL expiration, LRU eviction, tag-based invalidation,
//! transparent compression and best-effort persistence across restarts.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod service;
pub mod tasks;

pub use cache::{BatchEntry, CacheStats, CacheStore, Expiry, KeyedValue};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use persistence::{FileStorage, MemoryStorage, Storage};
pub use service::{CacheService, Memoized, WarmupEntry};
pub use tasks::spawn_cleanup_task;
