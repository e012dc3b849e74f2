//! Connection wrappers and the checkout handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use sqlbind_types::{Row, Value};

use crate::driver::RawConnection;
use crate::error::PoolError;
use crate::pool::PoolInner;

/// One pool slot wrapping a physical connection.
///
/// A slot is the pool's unit of identity: returning or reclaiming a
/// connection invalidates its slot and moves the physical connection into
/// a fresh one, so stale handles fail instead of touching a connection
/// that has moved on.
pub(crate) struct ConnectionSlot {
    pub id: u64,
    /// Factory identity hash at open time.
    pub type_code: u64,
    /// The physical connection. `None` once closed or moved to a new slot.
    /// Async mutex so a reclaim waits out an in-flight statement.
    pub raw: AsyncMutex<Option<Box<dyn RawConnection>>>,
    valid: AtomicBool,
    pub created_at: Instant,
    checked_out_at: parking_lot::Mutex<Instant>,
    last_used_at: parking_lot::Mutex<Instant>,
}

impl ConnectionSlot {
    pub fn new(id: u64, type_code: u64, raw: Box<dyn RawConnection>) -> Self {
        let now = Instant::now();
        Self {
            id,
            type_code,
            raw: AsyncMutex::new(Some(raw)),
            valid: AtomicBool::new(true),
            created_at: now,
            checked_out_at: parking_lot::Mutex::new(now),
            last_used_at: parking_lot::Mutex::new(now),
        }
    }

    /// Move a physical connection into a fresh slot, keeping its age.
    pub fn rewrap(id: u64, old: &ConnectionSlot, raw: Box<dyn RawConnection>) -> Self {
        let slot = Self::new(id, old.type_code, raw);
        // created_at is immutable after construction, so build in place.
        Self {
            created_at: old.created_at,
            last_used_at: parking_lot::Mutex::new(*old.last_used_at.lock()),
            ..slot
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn mark_checked_out(&self) {
        *self.checked_out_at.lock() = Instant::now();
    }

    pub fn mark_used(&self) {
        *self.last_used_at.lock() = Instant::now();
    }

    pub fn checkout_age(&self) -> Duration {
        self.checked_out_at.lock().elapsed()
    }

    pub fn idle_time(&self) -> Duration {
        self.last_used_at.lock().elapsed()
    }
}

/// A checked-out connection.
///
/// Return it with [`Pool::release`](crate::pool::Pool::release). A handle
/// dropped without release is returned best-effort from a spawned task; if
/// no runtime is available the connection is discarded.
pub struct PooledConnection {
    slot: Option<Arc<ConnectionSlot>>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    pub(crate) fn new(slot: Arc<ConnectionSlot>, pool: Arc<PoolInner>) -> Self {
        Self {
            slot: Some(slot),
            pool,
        }
    }

    pub(crate) fn take_slot(&mut self) -> Option<Arc<ConnectionSlot>> {
        self.slot.take()
    }

    fn slot(&self) -> Result<&Arc<ConnectionSlot>, PoolError> {
        match &self.slot {
            Some(slot) if slot.is_valid() => Ok(slot),
            _ => Err(PoolError::ConnectionInvalidated),
        }
    }

    /// Identifier of the underlying pool slot, for logging.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.slot.as_ref().map_or(0, |slot| slot.id)
    }

    /// Whether this handle can still run statements.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.slot.as_ref().is_some_and(|slot| slot.is_valid())
    }

    /// Run a row-producing statement on this connection.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, PoolError> {
        let slot = self.slot()?;
        let mut guard = slot.raw.lock().await;
        let raw = guard.as_mut().ok_or(PoolError::ConnectionInvalidated)?;
        let rows = raw.query(sql, params).await?;
        slot.mark_used();
        Ok(rows)
    }

    /// Run a statement returning its affected-row count.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, PoolError> {
        let slot = self.slot()?;
        let mut guard = slot.raw.lock().await;
        let raw = guard.as_mut().ok_or(PoolError::ConnectionInvalidated)?;
        let affected = raw.execute(sql, params).await?;
        slot.mark_used();
        Ok(affected)
    }

    /// Roll back the open transaction, if any.
    pub async fn rollback(&self) -> Result<(), PoolError> {
        let slot = self.slot()?;
        let mut guard = slot.raw.lock().await;
        let raw = guard.as_mut().ok_or(PoolError::ConnectionInvalidated)?;
        raw.rollback().await?;
        Ok(())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        tracing::trace!(connection_id = slot.id, "handle dropped without release");
        let pool = Arc::clone(&self.pool);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    pool.release_slot(slot).await;
                });
            }
            Err(_) => pool.discard_orphan(&slot),
        }
    }
}
