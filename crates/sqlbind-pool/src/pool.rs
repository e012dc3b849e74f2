//! The connection pool.
//!
//! Checkout order: an idle connection first, then a fresh one while under
//! capacity, then reclaiming the oldest overdue checkout, and finally a
//! bounded wait for a return. All bookkeeping lives under one mutex that is
//! never held across an await; opens in flight reserve capacity through a
//! pending counter so the limit holds across await points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::Notify;

use crate::config::PoolConfig;
use crate::connection::{ConnectionSlot, PooledConnection};
use crate::driver::{ConnectionFactory, connection_type_code};
use crate::error::PoolError;
use crate::state::{PoolState, PoolStatus};

/// A pooled connection manager over a [`ConnectionFactory`].
///
/// Connections are opened lazily. Every checkout is validated before it is
/// handed out; connections held past `max_checkout_time` can be reclaimed
/// for other callers, and returned connections are rolled back and rewrapped
/// so stale handles cannot touch them.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::new(factory, PoolConfig::new().max_active(20))?;
/// let conn = pool.acquire().await?;
/// let rows = conn.query("SELECT id, name FROM users", &[]).await?;
/// pool.release(conn).await;
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    factory: Arc<dyn ConnectionFactory>,
    config: parking_lot::RwLock<PoolConfig>,
    state: parking_lot::Mutex<PoolState>,
    /// Identity hash connections must carry to be returned to the idle list.
    expected_type_code: AtomicU64,
    /// Signalled once per freed capacity slot; a permit is stored if nobody
    /// is waiting, so a release just before a wait is not lost.
    available: Notify,
    closed: AtomicBool,
    next_connection_id: AtomicU64,
}

enum Plan {
    Reuse(Arc<ConnectionSlot>),
    Create,
    Reclaim(Arc<ConnectionSlot>),
    Wait,
}

impl Pool {
    /// Create a pool over `factory`. No connections are opened yet.
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let type_code = connection_type_code(factory.as_ref());
        tracing::info!(
            max_active = config.max_active,
            max_idle = config.max_idle,
            "connection pool created"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                config: parking_lot::RwLock::new(config),
                state: parking_lot::Mutex::new(PoolState::default()),
                expected_type_code: AtomicU64::new(type_code),
                available: Notify::new(),
                closed: AtomicBool::new(false),
                next_connection_id: AtomicU64::new(1),
            }),
        })
    }

    /// Check out a connection, waiting if the pool is at capacity.
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        self.inner.acquire().await
    }

    /// Return a connection to the pool.
    pub async fn release(&self, mut conn: PooledConnection) {
        if let Some(slot) = conn.take_slot() {
            self.inner.release_slot(slot).await;
        }
    }

    /// Invalidate and close every connection, idle and active alike.
    ///
    /// Stale handles fail their next operation instead of touching a closed
    /// connection. The expected connection type code is recomputed.
    pub async fn force_close_all(&self) {
        self.inner.force_close_all().await;
    }

    /// Replace the configuration and flush existing connections, which may
    /// have been opened under the old settings.
    pub async fn reconfigure(&self, config: PoolConfig) -> Result<(), PoolError> {
        config.validate()?;
        *self.inner.config.write() = config;
        self.inner.force_close_all().await;
        Ok(())
    }

    /// Close the pool. Pending and future checkouts fail with
    /// [`PoolError::PoolClosed`].
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.force_close_all().await;
        tracing::info!("connection pool closed");
    }

    /// Whether the pool has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.inner.config.read().clone()
    }

    /// Point-in-time snapshot of the pool.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let config = self.inner.config.read().clone();
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            active: state.active.len(),
            pending: state.pending_creates,
            max_active: config.max_active,
            request_count: state.request_count,
            accumulated_request_time: state.accumulated_request_time,
            accumulated_checkout_time: state.accumulated_checkout_time,
            claimed_overdue_count: state.claimed_overdue_count,
            accumulated_checkout_time_of_overdue: state.accumulated_checkout_time_of_overdue,
            had_to_wait_count: state.had_to_wait_count,
            accumulated_wait_time: state.accumulated_wait_time,
            bad_connection_count: state.bad_connection_count,
        }
    }
}

impl PoolInner {
    fn next_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, PoolError> {
        let requested_at = Instant::now();
        let mut local_bad = 0usize;
        let mut counted_wait = false;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(PoolError::PoolClosed);
            }
            let config = self.config.read().clone();

            let plan = {
                let mut state = self.state.lock();
                if let Some(slot) = state.idle.pop_front() {
                    // Stamped while the lock is held, so a concurrent
                    // at-capacity caller cannot read the slot's idle age as
                    // an overdue checkout while this one is still validating.
                    slot.mark_checked_out();
                    state.active.push(Arc::clone(&slot));
                    Plan::Reuse(slot)
                } else if state.active.len() + state.pending_creates < config.max_active {
                    state.pending_creates += 1;
                    Plan::Create
                } else {
                    let overdue = state
                        .active
                        .first()
                        .filter(|slot| slot.checkout_age() > config.max_checkout_time)
                        .cloned();
                    match overdue {
                        Some(oldest) => {
                            let age = oldest.checkout_age();
                            state.active.retain(|slot| !Arc::ptr_eq(slot, &oldest));
                            state.claimed_overdue_count += 1;
                            state.accumulated_checkout_time_of_overdue += age;
                            state.accumulated_checkout_time += age;
                            Plan::Reclaim(oldest)
                        }
                        None => {
                            if !counted_wait {
                                state.had_to_wait_count += 1;
                                counted_wait = true;
                            }
                            Plan::Wait
                        }
                    }
                }
            };

            let candidate = match plan {
                Plan::Reuse(slot) => {
                    tracing::trace!(connection_id = slot.id, "reusing idle connection");
                    slot
                }
                Plan::Create => match self.factory.open().await {
                    Ok(raw) => {
                        let slot = Arc::new(ConnectionSlot::new(
                            self.next_id(),
                            self.expected_type_code.load(Ordering::Relaxed),
                            raw,
                        ));
                        let mut state = self.state.lock();
                        state.pending_creates -= 1;
                        state.active.push(Arc::clone(&slot));
                        drop(state);
                        tracing::debug!(connection_id = slot.id, "created connection");
                        slot
                    }
                    Err(err) => {
                        {
                            let mut state = self.state.lock();
                            state.pending_creates -= 1;
                            state.bad_connection_count += 1;
                        }
                        // The reserved capacity slot goes back up for grabs.
                        self.available.notify_one();
                        return Err(err.into());
                    }
                },
                Plan::Reclaim(oldest) => {
                    tracing::warn!(
                        connection_id = oldest.id,
                        "claiming overdue connection from its holder"
                    );
                    oldest.invalidate();
                    // Waits out any statement in flight on the old handle.
                    let raw = oldest.raw.lock().await.take();
                    match raw {
                        Some(mut raw) => {
                            if let Err(err) = raw.rollback().await {
                                tracing::debug!(
                                    error = %err,
                                    "rollback of reclaimed connection failed"
                                );
                            }
                            let slot =
                                Arc::new(ConnectionSlot::rewrap(self.next_id(), &oldest, raw));
                            self.state.lock().active.push(Arc::clone(&slot));
                            slot
                        }
                        None => {
                            self.state.lock().bad_connection_count += 1;
                            local_bad += 1;
                            if local_bad > config.max_idle + config.bad_connection_tolerance {
                                return Err(PoolError::Exhausted {
                                    attempts: local_bad,
                                });
                            }
                            continue;
                        }
                    }
                }
                Plan::Wait => {
                    tracing::debug!("pool at capacity, waiting for a returned connection");
                    let wait_started = Instant::now();
                    let _ = tokio::time::timeout(config.time_to_wait, self.available.notified())
                        .await;
                    self.state.lock().accumulated_wait_time += wait_started.elapsed();
                    continue;
                }
            };

            if self.validate(&candidate, &config).await {
                candidate.mark_checked_out();
                candidate.mark_used();
                {
                    let mut state = self.state.lock();
                    state.request_count += 1;
                    state.accumulated_request_time += requested_at.elapsed();
                }
                tracing::trace!(connection_id = candidate.id, "checked out connection");
                return Ok(PooledConnection::new(candidate, Arc::clone(self)));
            }

            tracing::warn!(connection_id = candidate.id, "discarding bad connection");
            candidate.invalidate();
            if let Some(mut raw) = candidate.raw.lock().await.take() {
                raw.close().await;
            }
            {
                let mut state = self.state.lock();
                state.active.retain(|slot| !Arc::ptr_eq(slot, &candidate));
                state.bad_connection_count += 1;
            }
            self.available.notify_one();
            local_bad += 1;
            if local_bad > config.max_idle + config.bad_connection_tolerance {
                tracing::error!("could not get a good connection to the database");
                return Err(PoolError::Exhausted {
                    attempts: local_bad,
                });
            }
        }
    }

    /// Whether a candidate is fit to hand out.
    async fn validate(&self, slot: &Arc<ConnectionSlot>, config: &PoolConfig) -> bool {
        if !slot.is_valid() {
            return false;
        }
        let mut guard = slot.raw.lock().await;
        let Some(raw) = guard.as_mut() else {
            return false;
        };
        if raw.is_closed() {
            return false;
        }
        if config.ping_enabled && slot.idle_time() >= config.ping_connections_not_used_for {
            tracing::trace!(connection_id = slot.id, "pinging connection");
            if let Err(err) = raw.query(&config.ping_query, &[]).await {
                tracing::debug!(connection_id = slot.id, error = %err, "ping failed");
                return false;
            }
        }
        true
    }

    pub(crate) async fn release_slot(&self, slot: Arc<ConnectionSlot>) {
        let config = self.config.read().clone();
        let was_active = {
            let mut state = self.state.lock();
            let before = state.active.len();
            state.active.retain(|other| !Arc::ptr_eq(other, &slot));
            state.active.len() < before
        };

        if !slot.is_valid() {
            // Reclaimed or flushed while checked out; the raw connection has
            // already moved on, there is nothing to return.
            self.state.lock().bad_connection_count += 1;
            if was_active {
                self.available.notify_one();
            }
            return;
        }

        self.state.lock().accumulated_checkout_time += slot.checkout_age();
        slot.invalidate();
        let Some(mut raw) = slot.raw.lock().await.take() else {
            self.state.lock().bad_connection_count += 1;
            if was_active {
                self.available.notify_one();
            }
            return;
        };

        if let Err(err) = raw.rollback().await {
            tracing::debug!(
                connection_id = slot.id,
                error = %err,
                "rollback on return failed, closing connection"
            );
            raw.close().await;
            self.state.lock().bad_connection_count += 1;
            if was_active {
                self.available.notify_one();
            }
            return;
        }

        let reusable = slot.type_code == self.expected_type_code.load(Ordering::Relaxed)
            && !raw.is_closed()
            && !self.closed.load(Ordering::Acquire);
        // The state guard must end before the close await below; this future
        // is spawned from the handle's Drop and has to stay Send.
        let leftover = {
            let mut state = self.state.lock();
            if reusable && state.idle.len() < config.max_idle {
                let fresh = Arc::new(ConnectionSlot::rewrap(self.next_id(), &slot, raw));
                state.idle.push_back(fresh);
                None
            } else {
                Some(raw)
            }
        };
        match leftover {
            None => {
                tracing::trace!(connection_id = slot.id, "returned connection to idle list");
                self.available.notify_one();
            }
            Some(mut raw) => {
                tracing::debug!(connection_id = slot.id, "closing returned connection");
                raw.close().await;
                if was_active {
                    self.available.notify_one();
                }
            }
        }
    }

    /// Fallback when a handle is dropped outside any async runtime.
    pub(crate) fn discard_orphan(&self, slot: &Arc<ConnectionSlot>) {
        slot.invalidate();
        let mut state = self.state.lock();
        state.active.retain(|other| !Arc::ptr_eq(other, slot));
        state.bad_connection_count += 1;
        drop(state);
        self.available.notify_one();
    }

    async fn force_close_all(&self) {
        self.expected_type_code.store(
            connection_type_code(self.factory.as_ref()),
            Ordering::Relaxed,
        );
        let slots: Vec<Arc<ConnectionSlot>> = {
            let mut state = self.state.lock();
            let mut slots: Vec<_> = state.active.drain(..).collect();
            slots.extend(state.idle.drain(..));
            slots
        };
        for slot in slots {
            slot.invalidate();
            if let Some(mut raw) = slot.raw.lock().await.take() {
                if let Err(err) = raw.rollback().await {
                    tracing::trace!(connection_id = slot.id, error = %err, "rollback failed");
                }
                raw.close().await;
            }
        }
        self.available.notify_waiters();
        tracing::info!("forcefully closed all pooled connections");
    }
}
