//! Reclaimable-reference cache decorator.
//!
//! Values are stored in the inner cache as weak references; whether an
//! entry survives depends on strong holds kept elsewhere. A bounded ring of
//! the most recently stored and retrieved values keeps strong holds so that
//! hot entries resist reclamation; once a value's last strong hold drops,
//! its entry is a "weak miss" and gets purged.
//!
//! Without a collector notification queue, dead entries are found by a
//! sweep of the entry registry performed before mutating operations.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::key::CacheKey;

const DEFAULT_HARD_LINKS: usize = 256;

/// The weak envelope stored in the inner cache.
///
/// The wrapping is invisible to callers of the outer cache, which see
/// plain `Arc<V>` values.
pub struct SoftEntry<V>(Weak<V>);

impl<V> Clone for SoftEntry<V> {
    fn clone(&self) -> Self {
        SoftEntry(self.0.clone())
    }
}

/// Cache decorator holding values weakly, with a strong-hold ring.
pub struct SoftCache<C, V> {
    delegate: C,
    /// Most recent values held strongly, newest first.
    ring: Mutex<VecDeque<Arc<V>>>,
    hard_links: usize,
    /// Every live (key, weak) pair, used to purge reclaimed entries.
    registry: Mutex<Vec<(CacheKey, Weak<V>)>>,
}

impl<C, V> SoftCache<C, V> {
    /// Wrap `delegate` with the default strong-hold ring of 256 values.
    pub fn new(delegate: C) -> Self {
        Self::with_hard_links(delegate, DEFAULT_HARD_LINKS)
    }

    /// Wrap `delegate` with a strong-hold ring of `hard_links` values.
    pub fn with_hard_links(delegate: C, hard_links: usize) -> Self {
        Self {
            delegate,
            ring: Mutex::new(VecDeque::new()),
            hard_links: hard_links.max(1),
            registry: Mutex::new(Vec::new()),
        }
    }

    fn hold(&self, value: Arc<V>) {
        let mut ring = self.ring.lock();
        ring.push_front(value);
        while ring.len() > self.hard_links {
            ring.pop_back();
        }
    }

    /// Keys whose values have been reclaimed since the last sweep.
    fn drain_reclaimed(&self) -> Vec<CacheKey> {
        let mut registry = self.registry.lock();
        let mut dead = Vec::new();
        registry.retain(|(key, weak)| {
            if weak.strong_count() == 0 {
                dead.push(key.clone());
                false
            } else {
                true
            }
        });
        dead
    }
}

impl<C, V> SoftCache<C, V>
where
    C: Cache<Value = SoftEntry<V>>,
    V: Send + Sync + 'static,
{
    async fn remove_reclaimed_entries(&self) -> Result<(), CacheError> {
        for key in self.drain_reclaimed() {
            tracing::trace!(cache = self.delegate.id(), "purging reclaimed entry");
            self.delegate.remove(&key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C, V> Cache for SoftCache<C, V>
where
    C: Cache<Value = SoftEntry<V>>,
    V: Send + Sync + 'static,
{
    type Value = Arc<V>;

    fn id(&self) -> &str {
        self.delegate.id()
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Arc<V>>, CacheError> {
        match self.delegate.get(key).await? {
            Some(SoftEntry(weak)) => match weak.upgrade() {
                Some(value) => {
                    self.hold(Arc::clone(&value));
                    Ok(Some(value))
                }
                None => {
                    // Weak miss: the value was reclaimed, drop the stale entry.
                    self.registry.lock().retain(|(k, _)| k != key);
                    self.delegate.remove(key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, value: Arc<V>) -> Result<(), CacheError> {
        self.remove_reclaimed_entries().await?;
        let weak = Arc::downgrade(&value);
        {
            let mut registry = self.registry.lock();
            registry.retain(|(k, _)| *k != key);
            registry.push((key.clone(), weak.clone()));
        }
        self.delegate.put(key, SoftEntry(weak)).await?;
        // The ring is the only ambient strong root, so a fresh entry gets a
        // hold too; otherwise it would be reclaimed before any get.
        self.hold(value);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<Option<Arc<V>>, CacheError> {
        self.remove_reclaimed_entries().await?;
        self.registry.lock().retain(|(k, _)| k != key);
        let previous = self.delegate.remove(key).await?;
        Ok(previous.and_then(|SoftEntry(weak)| weak.upgrade()))
    }

    async fn clear(&self) {
        self.ring.lock().clear();
        self.registry.lock().clear();
        self.delegate.clear().await;
    }

    async fn len(&self) -> usize {
        if self.remove_reclaimed_entries().await.is_err() {
            tracing::warn!(cache = self.delegate.id(), "purge of reclaimed entries failed");
        }
        self.delegate.len().await
    }
}
