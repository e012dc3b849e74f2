//! Blocking cache decorator.
//!
//! Guarantees that only one task computes a missing entry at a time. A
//! lookup takes a per-key lock; on a hit the lock is released immediately,
//! on a miss the lock is carried forward so concurrent lookups for the same
//! key wait until the first task stores the value (or gives up via
//! `remove`). Per-key locks are created lazily and never discarded, so the
//! lock table grows with the set of distinct keys ever missed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::Cache;
use crate::error::CacheError;
use crate::key::CacheKey;

/// Serializes cache misses per key.
pub struct BlockingCache<C> {
    delegate: C,
    /// How long a lookup may wait on another task's in-flight miss.
    /// `None` waits indefinitely.
    timeout: Option<Duration>,
    locks: parking_lot::Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
    /// Guards carried across a miss, released by `put` or `remove`.
    pending: parking_lot::Mutex<HashMap<CacheKey, OwnedMutexGuard<()>>>,
}

impl<C> BlockingCache<C> {
    /// Wrap `delegate`; lookups wait indefinitely for in-flight misses.
    pub fn new(delegate: C) -> Self {
        Self {
            delegate,
            timeout: None,
            locks: parking_lot::Mutex::new(HashMap::new()),
            pending: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Bound how long a lookup waits for another task's in-flight miss.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn lock_for(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    fn release(&self, key: &CacheKey) {
        self.pending.lock().remove(key);
    }
}

impl<C: Cache> BlockingCache<C> {
    async fn acquire(&self, key: &CacheKey) -> Result<OwnedMutexGuard<()>, CacheError> {
        let lock = self.lock_for(key);
        match self.timeout {
            None => Ok(lock.lock_owned().await),
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| CacheError::LockTimeout {
                    key: key.to_string(),
                    millis: limit.as_millis() as u64,
                    cache: self.delegate.id().to_string(),
                }),
        }
    }
}

#[async_trait]
impl<C: Cache> Cache for BlockingCache<C> {
    type Value = C::Value;

    fn id(&self) -> &str {
        self.delegate.id()
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        let guard = self.acquire(key).await?;
        let value = self.delegate.get(key).await?;
        match value {
            Some(value) => Ok(Some(value)),
            None => {
                // Miss: keep the key locked until this caller puts a value
                // or backs out with remove.
                self.pending.lock().insert(key.clone(), guard);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: CacheKey, value: Self::Value) -> Result<(), CacheError> {
        let result = self.delegate.put(key.clone(), value).await;
        self.release(&key);
        result
    }

    async fn remove(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        // Only unblocks waiters; the entry itself is left alone so a value
        // stored by another layer is not discarded by a backing-out caller.
        self.release(key);
        Ok(None)
    }

    async fn clear(&self) {
        self.delegate.clear().await;
    }

    async fn len(&self) -> usize {
        self.delegate.len().await
    }
}
