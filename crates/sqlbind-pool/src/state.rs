//! Pool bookkeeping and its public snapshot.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::ConnectionSlot;

/// Mutable pool bookkeeping, guarded by one mutex in the pool.
#[derive(Default)]
pub(crate) struct PoolState {
    /// Connections waiting for reuse, oldest return first.
    pub idle: VecDeque<Arc<ConnectionSlot>>,
    /// Connections currently checked out, oldest checkout first.
    pub active: Vec<Arc<ConnectionSlot>>,
    /// Opens in flight; they count against `max_active`.
    pub pending_creates: usize,

    pub request_count: u64,
    pub accumulated_request_time: Duration,
    pub accumulated_checkout_time: Duration,
    pub claimed_overdue_count: u64,
    pub accumulated_checkout_time_of_overdue: Duration,
    pub had_to_wait_count: u64,
    pub accumulated_wait_time: Duration,
    pub bad_connection_count: u64,
}

/// Point-in-time view of the pool, for logging and diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Idle connections available for checkout.
    pub idle: usize,
    /// Connections currently checked out.
    pub active: usize,
    /// Opens in flight.
    pub pending: usize,
    /// Configured capacity.
    pub max_active: usize,

    /// Checkout requests served since pool creation.
    pub request_count: u64,
    /// Total time spent serving checkout requests.
    pub accumulated_request_time: Duration,
    /// Total time connections spent checked out.
    pub accumulated_checkout_time: Duration,
    /// Overdue connections reclaimed from their holders.
    pub claimed_overdue_count: u64,
    /// Total checkout time of the reclaimed connections.
    pub accumulated_checkout_time_of_overdue: Duration,
    /// Requests that had to wait for a connection.
    pub had_to_wait_count: u64,
    /// Total time requests spent waiting.
    pub accumulated_wait_time: Duration,
    /// Connections discarded as bad.
    pub bad_connection_count: u64,
}

impl PoolStatus {
    /// Average time to serve one checkout request.
    #[must_use]
    pub fn average_request_time(&self) -> Duration {
        average(self.accumulated_request_time, self.request_count)
    }

    /// Average checkout duration across returned connections.
    #[must_use]
    pub fn average_checkout_time(&self) -> Duration {
        average(self.accumulated_checkout_time, self.request_count)
    }

    /// Average wait among the requests that actually waited.
    #[must_use]
    pub fn average_wait_time(&self) -> Duration {
        average(self.accumulated_wait_time, self.had_to_wait_count)
    }

    /// Whether every capacity slot is spoken for.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.active + self.pending >= self.max_active
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        total / u32::try_from(count).unwrap_or(u32::MAX)
    }
}
