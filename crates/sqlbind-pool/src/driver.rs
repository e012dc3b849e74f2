//! The driver contract the pool manages connections for.
//!
//! The pool is driver-agnostic: anything that can open
//! [`RawConnection`]s can be pooled. Production drivers speak a wire
//! protocol; the `sqlbind-testing` crate provides a scripted in-memory
//! implementation for tests.

use async_trait::async_trait;

use sqlbind_types::{Row, Value};

use crate::error::DriverError;

/// One physical database connection.
///
/// Methods take `&mut self`; the pool serializes access through an async
/// mutex so a connection never runs two statements at once.
#[async_trait]
pub trait RawConnection: Send {
    /// Run a statement that produces rows.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DriverError>;

    /// Run a statement that produces an affected-row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError>;

    /// Roll back the open transaction, if any.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Switch autocommit on or off.
    async fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// Whether the physical connection is already gone.
    fn is_closed(&self) -> bool;

    /// Close the physical connection. Must be idempotent.
    async fn close(&mut self);
}

/// Opens physical connections for one configured endpoint.
///
/// The identity triple (url, username, password) also defines the pool's
/// connection type code; handles carrying a stale type code are closed
/// instead of returned to the idle list.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a fresh physical connection.
    async fn open(&self) -> Result<Box<dyn RawConnection>, DriverError>;

    /// Endpoint url this factory connects to.
    fn url(&self) -> String;

    /// Username the factory authenticates with.
    fn username(&self) -> String;

    /// Password the factory authenticates with.
    fn password(&self) -> String;
}

/// Hash of the factory identity triple.
///
/// Recomputed whenever the pool is flushed, so connections opened before a
/// credentials change are recognized and discarded on return.
pub(crate) fn connection_type_code(factory: &dyn ConnectionFactory) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    factory.url().hash(&mut hasher);
    factory.username().hash(&mut hasher);
    factory.password().hash(&mut hasher);
    hasher.finish()
}
