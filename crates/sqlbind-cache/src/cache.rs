//! The cache contract and the unbounded base cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CacheError;
use crate::key::CacheKey;

/// The capability set shared by the base cache and every decorator.
///
/// Decorators wrap exactly one inner cache, forming a linear chain; the
/// outermost decorator is what callers see. `get` is async because the
/// blocking decorator may wait for another caller to populate a key.
#[async_trait]
pub trait Cache: Send + Sync {
    /// The stored value type. Decorators are generic over the cache they
    /// wrap and preserve (or translate) this type.
    type Value: Clone + Send + Sync;

    /// Identifier of this cache (shared by the whole chain).
    fn id(&self) -> &str;

    /// Look up a key.
    async fn get(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError>;

    /// Store a value.
    async fn put(&self, key: CacheKey, value: Self::Value) -> Result<(), CacheError>;

    /// Remove a key, returning the previous value if the layer tracks one.
    async fn remove(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError>;

    /// Drop every entry.
    async fn clear(&self);

    /// Number of entries in the underlying store.
    async fn len(&self) -> usize;

    /// Whether the underlying store is empty.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<T: Cache + ?Sized> Cache for Arc<T> {
    type Value = T::Value;

    fn id(&self) -> &str {
        (**self).id()
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        (**self).get(key).await
    }

    async fn put(&self, key: CacheKey, value: Self::Value) -> Result<(), CacheError> {
        (**self).put(key, value).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<Option<Self::Value>, CacheError> {
        (**self).remove(key).await
    }

    async fn clear(&self) {
        (**self).clear().await;
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}

/// Unbounded in-memory base cache.
pub struct PerpetualCache<V> {
    id: String,
    entries: Mutex<HashMap<CacheKey, V>>,
}

impl<V> PerpetualCache<V> {
    /// Create an empty base cache with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync> Cache for PerpetualCache<V> {
    type Value = V;

    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<V>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: CacheKey, value: V) -> Result<(), CacheError> {
        self.entries.lock().insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<Option<V>, CacheError> {
        Ok(self.entries.lock().remove(key))
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    async fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
