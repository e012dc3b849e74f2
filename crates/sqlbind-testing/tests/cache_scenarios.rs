//! Concurrency scenarios for the cache decorator chain.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sqlbind_cache::{CacheBuilder, CacheError, CacheKey, EvictionPolicy};
use sqlbind_types::Value;

fn key(text: &str) -> CacheKey {
    CacheKey::from_pieces([Value::Text(text.to_string())])
}

#[tokio::test]
async fn test_blocking_chain_computes_each_key_once() {
    let cache = CacheBuilder::new("users").blocking().build::<i64>();
    let computed = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let computed = Arc::clone(&computed);
        tasks.push(tokio::spawn(async move {
            let probe = key("find-all");
            if let Some(value) = cache.get(&probe).await.expect("get") {
                *value
            } else {
                // Only the task holding the miss lock gets here; everyone
                // else parks on get until the put below releases them.
                computed.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.put(probe, Arc::new(42)).await.expect("put");
                42
            }
        }));
    }

    for task in tasks {
        assert_eq!(task.await.expect("task"), 42);
    }
    assert_eq!(computed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_blocking_lock_wait_can_time_out() {
    let cache = CacheBuilder::new("users")
        .lock_timeout(Duration::from_millis(10))
        .build::<i64>();

    // First miss takes the key's lock and never fills it.
    assert!(cache.get(&key("slow")).await.expect("first").is_none());

    let err = cache.get(&key("slow")).await;
    assert!(matches!(err, Err(CacheError::LockTimeout { .. })));

    // An unrelated key is not affected by the held lock.
    assert!(cache.get(&key("other")).await.expect("other").is_none());
    cache.remove(&key("other")).await.expect("release other");

    // Backing out of the computation releases the waiters.
    cache.remove(&key("slow")).await.expect("release");
    assert!(cache.get(&key("slow")).await.expect("after").is_none());
    cache.remove(&key("slow")).await.expect("release again");
}

#[tokio::test]
async fn test_full_chain_serves_concurrent_readers() {
    let cache = CacheBuilder::new("users")
        .eviction(EvictionPolicy::Lru(64))
        .soft()
        .blocking()
        .build::<Vec<i64>>();

    cache
        .put(key("warm"), Arc::new(vec![1, 2, 3]))
        .await
        .expect("warm put");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            cache.get(&key("warm")).await.expect("get")
        }));
    }
    for task in tasks {
        let value = task.await.expect("task");
        assert_eq!(value.as_deref(), Some(&vec![1, 2, 3]));
    }
}

#[tokio::test]
async fn test_clear_resets_the_whole_chain() {
    let cache = CacheBuilder::new("users")
        .eviction(EvictionPolicy::Fifo(8))
        .build::<i64>();

    cache.put(key("a"), Arc::new(1)).await.expect("put a");
    cache.put(key("b"), Arc::new(2)).await.expect("put b");
    assert_eq!(cache.len().await, 2);

    cache.clear().await;
    assert_eq!(cache.len().await, 0);
    assert!(cache.get(&key("a")).await.expect("get").is_none());
}
