//! Memoization on top of the cache.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::CacheService;
use crate::cache::{CacheValue, Expiry};
use crate::error::Result;

/// Source of per-wrapper identities. Closures defined in the same scope share
/// a type name, so the name alone does not tell them apart.
static NEXT_MEMO_ID: AtomicU64 = AtomicU64::new(0);

/// Derives a cache key from a call's arguments.
pub type KeyFn<A> = Box<dyn Fn(&A) -> String + Send + Sync>;

// == Memoized ==
/// A pure function whose results are cached by argument.
pub struct Memoized<T, A, F> {
    cache: CacheService<T>,
    func: F,
    /// Distinguishes this wrapper from others over the same function type
    id: u64,
    key_fn: Option<KeyFn<A>>,
    ttl: Option<Expiry>,
    _args: PhantomData<fn(&A)>,
}

impl<T, A, F> Memoized<T, A, F>
where
    T: CacheValue + Send + Sync + 'static,
    A: Serialize,
    F: Fn(&A) -> T,
{
    /// Returns the cached result for `args`, computing and caching it on a
    /// miss.
    pub async fn call(&self, args: A) -> Result<T> {
        let key = self.key_for(&args)?;

        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let value = (self.func)(&args);
        self.cache.set(key, value.clone(), self.ttl, &[]).await?;
        Ok(value)
    }

    /// Cache key used for `args`.
    ///
    /// Without a key function this is
    /// `memoized_<function type>#<wrapper id>_<args JSON>`.
    pub fn key_for(&self, args: &A) -> Result<String> {
        match &self.key_fn {
            Some(key_fn) => Ok(key_fn(args)),
            None => Ok(format!(
                "memoized_{}#{}_{}",
                type_name::<F>(),
                self.id,
                serde_json::to_string(args)?
            )),
        }
    }
}

impl<T: CacheValue + Send + Sync + 'static> CacheService<T> {
    // == Memoize ==
    /// Wraps `func` so repeated calls with the same derived key reuse a
    /// cached result.
    ///
    /// # Arguments
    /// * `func` - A pure function of its arguments
    /// * `key_fn` - Custom key derivation; None keys on function type and arguments
    /// * `ttl` - Lifetime of cached results; None uses the configured default
    pub fn memoize<A, F>(
        &self,
        func: F,
        key_fn: Option<KeyFn<A>>,
        ttl: Option<Expiry>,
    ) -> Memoized<T, A, F>
    where
        A: Serialize,
        F: Fn(&A) -> T,
    {
        Memoized {
            cache: self.clone(),
            func,
            id: NEXT_MEMO_ID.fetch_add(1, Ordering::Relaxed),
            key_fn,
            ttl,
            _args: PhantomData,
        }
    }
}
