//! Assembly of a decorator chain from declarative options.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, PerpetualCache};
use crate::decorators::blocking::BlockingCache;
use crate::decorators::fifo::FifoCache;
use crate::decorators::lru::LruCache;
use crate::decorators::soft::{SoftCache, SoftEntry};

/// Which bounded-size policy, if any, the chain applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Unbounded; entries live until removed or cleared.
    None,
    /// Evict in insertion order once more than this many entries exist.
    Fifo(usize),
    /// Evict the least recently touched entry past this capacity.
    Lru(usize),
}

/// Builds a cache chain in the conventional order, outermost first:
/// blocking, then eviction, then the soft layer, then the base store.
///
/// ```no_run
/// use sqlbind_cache::{CacheBuilder, EvictionPolicy};
///
/// let cache = CacheBuilder::new("com.example.UserMapper")
///     .eviction(EvictionPolicy::Lru(512))
///     .blocking()
///     .build::<Vec<String>>();
/// ```
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    id: String,
    eviction: EvictionPolicy,
    soft: bool,
    blocking: bool,
    lock_timeout: Option<Duration>,
}

impl CacheBuilder {
    /// Start a chain for the cache with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eviction: EvictionPolicy::None,
            soft: false,
            blocking: false,
            lock_timeout: None,
        }
    }

    /// Apply a size-bounding policy.
    #[must_use]
    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// Hold values weakly so unreferenced results can be reclaimed.
    #[must_use]
    pub fn soft(mut self) -> Self {
        self.soft = true;
        self
    }

    /// Serialize misses so each key is computed by at most one task.
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Bound the blocking-layer lock wait. Implies [`blocking`](Self::blocking).
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.blocking = true;
        self.lock_timeout = Some(timeout);
        self
    }

    /// Assemble the chain for values of type `V`.
    pub fn build<V: Send + Sync + 'static>(self) -> Arc<dyn Cache<Value = Arc<V>>> {
        if self.soft {
            let base = PerpetualCache::<SoftEntry<V>>::new(self.id.clone());
            self.bound(SoftCache::new(base))
        } else {
            let base = PerpetualCache::<Arc<V>>::new(self.id.clone());
            self.bound(base)
        }
    }

    fn bound<C>(self, cache: C) -> Arc<dyn Cache<Value = C::Value>>
    where
        C: Cache + 'static,
    {
        match self.eviction {
            EvictionPolicy::None => self.gated(cache),
            EvictionPolicy::Fifo(capacity) => self.gated(FifoCache::with_capacity(cache, capacity)),
            EvictionPolicy::Lru(capacity) => self.gated(LruCache::with_capacity(cache, capacity)),
        }
    }

    fn gated<C>(self, cache: C) -> Arc<dyn Cache<Value = C::Value>>
    where
        C: Cache + 'static,
    {
        if self.blocking {
            let mut blocking = BlockingCache::new(cache);
            if let Some(timeout) = self.lock_timeout {
                blocking = blocking.with_timeout(timeout);
            }
            Arc::new(blocking)
        } else {
            Arc::new(cache)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;
    use sqlbind_types::Value;

    fn key(n: i64) -> CacheKey {
        CacheKey::from_pieces([Value::Int(n)])
    }

    #[tokio::test]
    async fn test_plain_chain_round_trip() {
        let cache = CacheBuilder::new("users").build::<String>();
        assert_eq!(cache.id(), "users");
        cache.put(key(1), Arc::new("a".to_string())).await.ok();
        let got = cache.get(&key(1)).await.ok().flatten();
        assert_eq!(got.as_deref().map(String::as_str), Some("a"));
    }

    #[tokio::test]
    async fn test_full_chain_evicts_by_recency() {
        let cache = CacheBuilder::new("users")
            .eviction(EvictionPolicy::Lru(2))
            .soft()
            .blocking()
            .build::<i32>();

        cache.put(key(1), Arc::new(1)).await.ok();
        cache.put(key(2), Arc::new(2)).await.ok();
        cache.get(&key(1)).await.ok();
        cache.put(key(3), Arc::new(3)).await.ok();

        assert_eq!(cache.get(&key(1)).await.ok().flatten(), Some(Arc::new(1)));
        // Key 2 was the least recently touched; its miss leaves the key
        // locked, so back out before the next probe.
        assert_eq!(cache.get(&key(2)).await.ok().flatten(), None);
        cache.remove(&key(2)).await.ok();
    }

    #[tokio::test]
    async fn test_fifo_chain_evicts_by_insertion() {
        let cache = CacheBuilder::new("users")
            .eviction(EvictionPolicy::Fifo(2))
            .build::<i32>();

        cache.put(key(1), Arc::new(1)).await.ok();
        cache.put(key(2), Arc::new(2)).await.ok();
        cache.put(key(3), Arc::new(3)).await.ok();

        assert_eq!(cache.get(&key(1)).await.ok().flatten(), None);
        assert_eq!(cache.get(&key(3)).await.ok().flatten(), Some(Arc::new(3)));
    }
}
