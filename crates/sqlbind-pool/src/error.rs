//! Pool and driver errors.

use thiserror::Error;

/// Errors reported by a driver implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Opening a new physical connection failed.
    #[error("could not open connection: {message}")]
    Connect {
        /// Driver-reported reason.
        message: String,
    },

    /// A statement failed on the server side.
    #[error("statement failed: {message}")]
    Statement {
        /// Driver-reported reason.
        message: String,
    },

    /// The physical connection is gone.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Errors raised by the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool configuration is inconsistent.
    #[error("invalid pool configuration: {message}")]
    Config {
        /// What is wrong with it.
        message: String,
    },

    /// The underlying driver failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Too many bad connections were seen while serving one request.
    #[error("could not get a good connection after {attempts} bad attempts")]
    Exhausted {
        /// Bad connections encountered by this request alone.
        attempts: usize,
    },

    /// The pool has been closed.
    #[error("pool is closed")]
    PoolClosed,

    /// The handle's connection was reclaimed or returned; the handle is dead.
    #[error("connection handle is no longer valid")]
    ConnectionInvalidated,
}
