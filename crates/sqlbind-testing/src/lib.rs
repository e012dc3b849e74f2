//! # sqlbind-testing
//!
//! Scripted in-memory driver for exercising the pool, cache, and executor
//! without a database. Results are scripted by SQL prefix; connections can
//! be made slow, broken on open, or born closed to drive the pool's bad
//! connection handling. The cross-crate integration scenarios live in this
//! crate's `tests/` directory.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use sqlbind_pool::{ConnectionFactory, DriverError, RawConnection};
use sqlbind_types::{Row, Value};

/// Build a row from column names and values.
#[must_use]
pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().map(ToString::to_string).collect(), values)
}

#[derive(Clone)]
enum Scripted {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(String),
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<Vec<(String, Scripted)>>,
    opened: AtomicUsize,
    queries: AtomicUsize,
    executes: AtomicUsize,
    rollbacks: AtomicUsize,
    /// How many upcoming opens fail.
    fail_opens: AtomicUsize,
    /// How many upcoming opens produce connections that are born closed.
    open_closed: AtomicUsize,
    query_delay: Mutex<Option<Duration>>,
}

impl MockState {
    fn lookup(&self, sql: &str) -> Option<Scripted> {
        self.scripts
            .lock()
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
    }
}

/// Scripted connection factory.
///
/// All connections opened by one factory share its script table and
/// counters, so a test can assert how many statements actually reached
/// "the database" regardless of which pooled connection ran them.
pub struct MockFactory {
    state: Arc<MockState>,
    url: String,
    username: String,
    password: Mutex<String>,
}

impl MockFactory {
    /// A factory with an empty script table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            url: "mock://db".to_string(),
            username: "tester".to_string(),
            password: Mutex::new(String::new()),
        }
    }

    /// Script rows for statements starting with `sql_prefix`.
    pub fn script_rows(&self, sql_prefix: impl Into<String>, rows: Vec<Row>) {
        self.state
            .scripts
            .lock()
            .push((sql_prefix.into(), Scripted::Rows(rows)));
    }

    /// Script an affected-row count for statements starting with `sql_prefix`.
    pub fn script_affected(&self, sql_prefix: impl Into<String>, affected: u64) {
        self.state
            .scripts
            .lock()
            .push((sql_prefix.into(), Scripted::Affected(affected)));
    }

    /// Script a failure for statements starting with `sql_prefix`.
    pub fn script_failure(&self, sql_prefix: impl Into<String>, message: impl Into<String>) {
        self.state
            .scripts
            .lock()
            .push((sql_prefix.into(), Scripted::Fail(message.into())));
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.fail_opens.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` opens produce connections that are already
    /// closed, which the pool must discard during validation.
    pub fn open_closed_connections(&self, count: usize) {
        self.state.open_closed.store(count, Ordering::SeqCst);
    }

    /// Delay every query by `delay`.
    pub fn set_query_delay(&self, delay: Duration) {
        *self.state.query_delay.lock() = Some(delay);
    }

    /// Change the factory's password, altering its identity hash.
    pub fn set_password(&self, password: impl Into<String>) {
        *self.password.lock() = password.into();
    }

    /// Physical connections opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Queries that reached a connection.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.state.queries.load(Ordering::SeqCst)
    }

    /// Mutations that reached a connection.
    #[must_use]
    pub fn executes(&self) -> usize {
        self.state.executes.load(Ordering::SeqCst)
    }

    /// Rollbacks issued across all connections.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn open(&self) -> Result<Box<dyn RawConnection>, DriverError> {
        let pending_failures = self.state.fail_opens.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.state
                .fail_opens
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(DriverError::Connect {
                message: "scripted open failure".to_string(),
            });
        }
        let born_closed = {
            let pending = self.state.open_closed.load(Ordering::SeqCst);
            if pending > 0 {
                self.state.open_closed.store(pending - 1, Ordering::SeqCst);
                true
            } else {
                false
            }
        };
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(born_closed, "opened mock connection");
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            closed: born_closed,
        }))
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn username(&self) -> String {
        self.username.clone()
    }

    fn password(&self) -> String {
        self.password.lock().clone()
    }
}

/// One scripted connection.
pub struct MockConnection {
    state: Arc<MockState>,
    closed: bool,
}

impl MockConnection {
    async fn delay(&self) {
        let delay = *self.state.query_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn query(&mut self, sql: &str, _params: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.check_open()?;
        self.delay().await;
        self.state.queries.fetch_add(1, Ordering::SeqCst);
        match self.state.lookup(sql) {
            Some(Scripted::Rows(rows)) => Ok(rows),
            Some(Scripted::Affected(_)) | None => Ok(Vec::new()),
            Some(Scripted::Fail(message)) => Err(DriverError::Statement { message }),
        }
    }

    async fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<u64, DriverError> {
        self.check_open()?;
        self.delay().await;
        self.state.executes.fetch_add(1, Ordering::SeqCst);
        match self.state.lookup(sql) {
            Some(Scripted::Affected(affected)) => Ok(affected),
            Some(Scripted::Rows(_)) | None => Ok(0),
            Some(Scripted::Fail(message)) => Err(DriverError::Statement { message }),
        }
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.check_open()?;
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_autocommit(&mut self, _enabled: bool) -> Result<(), DriverError> {
        self.check_open()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_rows_match_by_prefix() {
        let factory = MockFactory::new();
        factory.script_rows(
            "SELECT * FROM users",
            vec![row(&["id"], vec![Value::Int(1)])],
        );
        let mut conn = factory.open().await.expect("open");
        let rows = conn
            .query("SELECT * FROM users WHERE id = ?", &[Value::Int(1)])
            .await
            .expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(factory.queries(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_statements_return_empty() {
        let factory = MockFactory::new();
        let mut conn = factory.open().await.expect("open");
        assert!(conn.query("SELECT 1", &[]).await.expect("query").is_empty());
        assert_eq!(conn.execute("DELETE FROM t", &[]).await.ok(), Some(0));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let factory = MockFactory::new();
        factory.script_failure("SELECT boom", "table on fire");
        let mut conn = factory.open().await.expect("open");
        assert!(matches!(
            conn.query("SELECT boom", &[]).await,
            Err(DriverError::Statement { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_opens_count_down() {
        let factory = MockFactory::new();
        factory.fail_next_opens(1);
        assert!(factory.open().await.is_err());
        assert!(factory.open().await.is_ok());
        assert_eq!(factory.opened(), 1);
    }
}
