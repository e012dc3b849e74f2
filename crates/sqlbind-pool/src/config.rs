//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Tunables for the connection pool.
///
/// Defaults follow long-established pooling practice: ten active
/// connections, five idle, twenty-second checkout and wait limits, and
/// pinging disabled until a ping query is configured.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum connections checked out or being opened at once.
    pub max_active: usize,
    /// Maximum connections kept idle for reuse.
    pub max_idle: usize,
    /// Checkout age beyond which an active connection may be reclaimed.
    pub max_checkout_time: Duration,
    /// How long one wait for a returned connection lasts before re-checking.
    pub time_to_wait: Duration,
    /// Extra bad connections tolerated beyond `max_idle` per request.
    pub bad_connection_tolerance: usize,
    /// Whether idle connections are validated with the ping query.
    pub ping_enabled: bool,
    /// Statement used to probe a connection.
    pub ping_query: String,
    /// Only ping connections idle for at least this long.
    pub ping_connections_not_used_for: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 10,
            max_idle: 5,
            max_checkout_time: Duration::from_secs(20),
            time_to_wait: Duration::from_secs(20),
            bad_connection_tolerance: 3,
            ping_enabled: false,
            ping_query: "NO PING QUERY SET".to_string(),
            ping_connections_not_used_for: Duration::ZERO,
        }
    }
}

impl PoolConfig {
    /// Start from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of simultaneously checked-out connections.
    #[must_use]
    pub fn max_active(mut self, count: usize) -> Self {
        self.max_active = count;
        self
    }

    /// Set the maximum number of idle connections kept for reuse.
    #[must_use]
    pub fn max_idle(mut self, count: usize) -> Self {
        self.max_idle = count;
        self
    }

    /// Set the checkout age after which a connection may be reclaimed.
    #[must_use]
    pub fn max_checkout_time(mut self, limit: Duration) -> Self {
        self.max_checkout_time = limit;
        self
    }

    /// Set the length of one bounded wait for a returned connection.
    #[must_use]
    pub fn time_to_wait(mut self, wait: Duration) -> Self {
        self.time_to_wait = wait;
        self
    }

    /// Set how many extra bad connections a single request tolerates.
    #[must_use]
    pub fn bad_connection_tolerance(mut self, tolerance: usize) -> Self {
        self.bad_connection_tolerance = tolerance;
        self
    }

    /// Enable pinging with the given probe statement.
    #[must_use]
    pub fn ping_query(mut self, query: impl Into<String>) -> Self {
        self.ping_query = query.into();
        self.ping_enabled = true;
        self
    }

    /// Only ping connections idle for at least this long.
    #[must_use]
    pub fn ping_connections_not_used_for(mut self, idle: Duration) -> Self {
        self.ping_connections_not_used_for = idle;
        self
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_active == 0 {
            return Err(PoolError::Config {
                message: "max_active must be at least 1".to_string(),
            });
        }
        if self.time_to_wait.is_zero() {
            return Err(PoolError::Config {
                message: "time_to_wait must be non-zero".to_string(),
            });
        }
        if self.ping_enabled && self.ping_query.trim().is_empty() {
            return Err(PoolError::Config {
                message: "ping is enabled but no ping query is set".to_string(),
            });
        }
        Ok(())
    }
}
