//! Pool lifecycle scenarios over the scripted driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlbind_pool::{Pool, PoolConfig, PoolError};
use sqlbind_testing::MockFactory;

fn pool(factory: &Arc<MockFactory>, config: PoolConfig) -> Pool {
    match Pool::new(Arc::clone(factory) as _, config) {
        Ok(pool) => pool,
        Err(err) => panic!("pool construction failed: {err}"),
    }
}

#[tokio::test]
async fn test_third_checkout_waits_for_a_return() {
    let factory = Arc::new(MockFactory::new());
    let pool = pool(
        &factory,
        PoolConfig::new()
            .max_active(2)
            .time_to_wait(Duration::from_millis(20)),
    );

    let a = pool.acquire().await.expect("first");
    let _b = pool.acquire().await.expect("second");

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let conn = pool.acquire().await.expect("third");
            let waited = started.elapsed();
            pool.release(conn).await;
            waited
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "third checkout must park at capacity");

    pool.release(a).await;
    let waited = waiter.await.expect("waiter task");
    assert!(waited >= Duration::from_millis(40));
    // The waiter reused a returned connection instead of opening a third.
    assert_eq!(factory.opened(), 2);
    assert_eq!(pool.status().had_to_wait_count, 1);
}

#[tokio::test]
async fn test_overdue_checkout_is_reclaimed() {
    let factory = Arc::new(MockFactory::new());
    let pool = pool(
        &factory,
        PoolConfig::new()
            .max_active(1)
            .max_checkout_time(Duration::ZERO),
    );

    let first = pool.acquire().await.expect("first");
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Immediately overdue, so the second checkout claims the connection
    // without waiting or opening another one.
    let second = pool.acquire().await.expect("reclaim");
    assert_eq!(factory.opened(), 1);
    assert_eq!(pool.status().claimed_overdue_count, 1);

    // The original holder's handle is dead.
    assert!(matches!(
        first.query("SELECT 1", &[]).await,
        Err(PoolError::ConnectionInvalidated)
    ));

    // The reclaimed connection was rolled back before being handed over.
    assert_eq!(factory.rollbacks(), 1);
    assert!(second.query("SELECT 1", &[]).await.is_ok());
    pool.release(second).await;
    drop(first);
}

#[tokio::test]
async fn test_slow_validation_is_not_mistaken_for_an_overdue_checkout() {
    let factory = Arc::new(MockFactory::new());
    factory.script_rows("SELECT PING", Vec::new());
    let pool = pool(
        &factory,
        PoolConfig::new()
            .max_active(1)
            .max_checkout_time(Duration::from_millis(200))
            .ping_query("SELECT PING")
            .ping_connections_not_used_for(Duration::ZERO),
    );

    // Season an idle connection well past max_checkout_time.
    let seed = pool.acquire().await.expect("seed");
    pool.release(seed).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The next checkout reuses the idle slot and sits in a slow ping.
    factory.set_query_delay(Duration::from_millis(100));
    let reuser = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let conn = pool.acquire().await.expect("reuse");
            let alive = conn.is_valid();
            pool.release(conn).await;
            alive
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // At capacity while the reuser is still validating: this caller must
    // wait for the return, not claim the connection as overdue.
    let second = pool.acquire().await.expect("second");
    assert!(reuser.await.expect("reuser task"), "reused handle went dead");
    assert_eq!(pool.status().claimed_overdue_count, 0);
    assert_eq!(factory.opened(), 1);
    pool.release(second).await;
}

#[tokio::test]
async fn test_repeatedly_bad_connections_exhaust_the_pool() {
    let factory = Arc::new(MockFactory::new());
    factory.open_closed_connections(10);
    let pool = pool(
        &factory,
        PoolConfig::new()
            .max_active(1)
            .max_idle(0)
            .bad_connection_tolerance(0),
    );

    let err = pool.acquire().await;
    assert!(matches!(err, Err(PoolError::Exhausted { .. })));
    assert!(pool.status().bad_connection_count >= 1);
}

#[tokio::test]
async fn test_open_failure_propagates_as_driver_error() {
    let factory = Arc::new(MockFactory::new());
    factory.fail_next_opens(1);
    let pool = pool(&factory, PoolConfig::default());

    assert!(matches!(pool.acquire().await, Err(PoolError::Driver(_))));
    // The failed open released its reserved capacity slot.
    let conn = pool.acquire().await.expect("retry");
    pool.release(conn).await;
    assert_eq!(factory.opened(), 1);
}

#[tokio::test]
async fn test_dropped_handle_returns_to_the_pool() {
    let factory = Arc::new(MockFactory::new());
    let pool = pool(&factory, PoolConfig::default());

    let conn = pool.acquire().await.expect("checkout");
    drop(conn);

    // The drop path returns the connection on a spawned task.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.status().active, 0);
    assert_eq!(pool.status().idle, 1);
}

#[tokio::test]
async fn test_dropped_handle_is_closed_when_the_idle_list_is_full() {
    let factory = Arc::new(MockFactory::new());
    let pool = pool(&factory, PoolConfig::new().max_active(2).max_idle(1));

    let a = pool.acquire().await.expect("a");
    let b = pool.acquire().await.expect("b");
    pool.release(a).await;
    drop(b);

    // The spawned return finds the idle list full and closes the
    // connection instead of queueing a second one.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.status().idle, 1);
    assert_eq!(pool.status().active, 0);
}

#[tokio::test]
async fn test_force_close_invalidates_checked_out_handles() {
    let factory = Arc::new(MockFactory::new());
    let pool = pool(&factory, PoolConfig::default());

    let conn = pool.acquire().await.expect("checkout");
    pool.force_close_all().await;

    assert!(matches!(
        conn.execute("DELETE FROM t", &[]).await,
        Err(PoolError::ConnectionInvalidated)
    ));
    drop(conn);

    // Fresh checkouts open new physical connections afterwards.
    let again = pool.acquire().await.expect("reopen");
    assert_eq!(factory.opened(), 2);
    pool.release(again).await;
}

#[tokio::test]
async fn test_credentials_change_discards_returned_connections() {
    let factory = Arc::new(MockFactory::new());
    let pool = pool(&factory, PoolConfig::default());

    let conn = pool.acquire().await.expect("checkout");

    // Rotating the password while a connection is out changes the expected
    // type code once the pool is flushed; the old handle dies with the
    // flush and nothing opened under the old identity is kept.
    factory.set_password("rotated");
    pool.force_close_all().await;
    drop(conn);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pool.status().idle, 0);

    let fresh = pool.acquire().await.expect("fresh");
    assert!(fresh.query("SELECT 1", &[]).await.is_ok());
    pool.release(fresh).await;
    assert_eq!(pool.status().idle, 1);
}

#[tokio::test]
async fn test_ping_probes_idle_connections_before_handing_them_out() {
    let factory = Arc::new(MockFactory::new());
    factory.script_rows("SELECT PING", Vec::new());
    let pool = pool(
        &factory,
        PoolConfig::new()
            .ping_query("SELECT PING")
            .ping_connections_not_used_for(Duration::ZERO),
    );

    let conn = pool.acquire().await.expect("first");
    pool.release(conn).await;

    let before = factory.queries();
    let conn = pool.acquire().await.expect("second");
    assert!(factory.queries() > before, "idle connection must be pinged");
    assert_eq!(factory.opened(), 1);
    pool.release(conn).await;
}

#[tokio::test]
async fn test_failing_ping_exhausts_the_pool() {
    let factory = Arc::new(MockFactory::new());
    factory.script_failure("SELECT PING", "connection gone");
    let pool = pool(
        &factory,
        PoolConfig::new()
            .max_idle(0)
            .bad_connection_tolerance(0)
            .ping_query("SELECT PING")
            .ping_connections_not_used_for(Duration::ZERO),
    );

    // Every candidate, fresh or idle, fails the probe.
    assert!(matches!(
        pool.acquire().await,
        Err(PoolError::Exhausted { .. })
    ));
}
