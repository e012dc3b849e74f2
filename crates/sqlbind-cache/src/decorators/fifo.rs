//! FIFO (first in, first out) cache decorator.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::key::CacheKey;

const DEFAULT_CAPACITY: usize = 1024;

/// Evicts the oldest-inserted key once the capacity is exceeded.
///
/// Lookups do not affect the eviction order; only insertion does.
pub struct FifoCache<C> {
    delegate: C,
    keys: Mutex<VecDeque<CacheKey>>,
    capacity: usize,
}

impl<C> FifoCache<C> {
    /// Wrap `delegate` with the default capacity of 1024 entries.
    pub fn new(delegate: C) -> Self {
        Self::with_capacity(delegate, DEFAULT_CAPACITY)
    }

    /// Wrap `delegate`, evicting once more than `capacity` keys were inserted.
    pub fn with_capacity(delegate: C, capacity: usize) -> Self {
        Self {
            delegate,
            keys: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record an insertion and return the key to evict, if any.
    fn cycle(&self, key: &CacheKey) -> Option<CacheKey> {
        let mut keys = self.keys.lock();
        keys.push_back(key.clone());
        if keys.len() > self.capacity {
            keys.pop_front()
        } else {
            None
        }
    }
}

#[async_trait]
impl<C: Cache> Cache for FifoCache<C> {
    type Value = C::Value;

    fn id(&self) -> &str {
        self.delegate.id()
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        self.delegate.get(key).await
    }

    async fn put(&self, key: CacheKey, value: Self::Value) -> Result<(), CacheError> {
        if let Some(oldest) = self.cycle(&key) {
            tracing::trace!(cache = self.id(), "evicting oldest entry");
            self.delegate.remove(&oldest).await?;
        }
        self.delegate.put(key, value).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        self.delegate.remove(key).await
    }

    async fn clear(&self) {
        self.delegate.clear().await;
        self.keys.lock().clear();
    }

    async fn len(&self) -> usize {
        self.delegate.len().await
    }
}
