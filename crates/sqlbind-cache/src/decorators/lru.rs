//! LRU (least recently used) cache decorator.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::key::CacheKey;

const DEFAULT_CAPACITY: usize = 1024;

/// Evicts the least-recently-touched key once the capacity is exceeded.
///
/// Both `get` and `put` touch a key's recency; a get refreshes an entry
/// even though it does not mutate the store.
pub struct LruCache<C> {
    delegate: C,
    index: Mutex<lru::LruCache<CacheKey, ()>>,
}

impl<C> LruCache<C> {
    /// Wrap `delegate` with the default capacity of 1024 entries.
    pub fn new(delegate: C) -> Self {
        Self::with_capacity(delegate, DEFAULT_CAPACITY)
    }

    /// Wrap `delegate`, evicting once more than `capacity` keys are live.
    pub fn with_capacity(delegate: C, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            delegate,
            index: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    /// Record an insertion touch and return the key evicted by it, if any.
    fn cycle(&self, key: &CacheKey) -> Option<CacheKey> {
        let mut index = self.index.lock();
        match index.push(key.clone(), ()) {
            // push returns the displaced entry; re-pushing an existing key
            // returns that same key, which is a touch, not an eviction.
            Some((evicted, ())) if evicted != *key => Some(evicted),
            _ => None,
        }
    }
}

#[async_trait]
impl<C: Cache> Cache for LruCache<C> {
    type Value = C::Value;

    fn id(&self) -> &str {
        self.delegate.id()
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        // Touch.
        self.index.lock().get(key);
        self.delegate.get(key).await
    }

    async fn put(&self, key: CacheKey, value: Self::Value) -> Result<(), CacheError> {
        if let Some(eldest) = self.cycle(&key) {
            tracing::trace!(cache = self.id(), "evicting least recently used entry");
            self.delegate.remove(&eldest).await?;
        }
        self.delegate.put(key, value).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        self.index.lock().pop(key);
        self.delegate.remove(key).await
    }

    async fn clear(&self) {
        self.delegate.clear().await;
        self.index.lock().clear();
    }

    async fn len(&self) -> usize {
        self.delegate.len().await
    }
}
