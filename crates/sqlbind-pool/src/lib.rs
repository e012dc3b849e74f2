//! # sqlbind-pool
//!
//! Pooled connection manager for the sqlbind persistence core.
//!
//! The pool sits on the [`ConnectionFactory`] / [`RawConnection`] driver
//! contract and hands out [`PooledConnection`] handles. Checkouts prefer
//! idle connections, open new ones while under capacity, reclaim overdue
//! checkouts, and otherwise wait in bounded slices for a return. Returned
//! and reclaimed connections are rolled back and rewrapped so stale handles
//! fail fast instead of touching a connection that moved on.

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod pool;
pub mod state;

pub use config::PoolConfig;
pub use connection::PooledConnection;
pub use driver::{ConnectionFactory, RawConnection};
pub use error::{DriverError, PoolError};
pub use pool::Pool;
pub use state::PoolStatus;
