//! Statement execution orchestration.
//!
//! One call runs through a fixed sequence: acquire a connection, bind the
//! statement, compute the cache key, probe the second-level cache for
//! cacheable selects, execute if needed, materialize rows, populate the
//! cache, and release the connection in a cleanup step on every path. A
//! cache hit releases the connection without executing anything.

use std::collections::HashMap;
use std::sync::Arc;

use sqlbind_cache::{Cache, CacheKey};
use sqlbind_mapping::{BoundSql, CommandKind, StatementDefinition, StatementRegistry};
use sqlbind_pool::{Pool, PooledConnection};
use sqlbind_types::{CodecRegistry, Row, Value};

use crate::error::ExecutorError;

/// Paging bounds applied to a select's result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    /// Rows skipped from the front of the result.
    pub offset: usize,
    /// Maximum rows returned after the offset.
    pub limit: usize,
}

impl RowBounds {
    /// No limit sentinel.
    pub const NO_LIMIT: usize = usize::MAX;

    /// Bounds with the given offset and limit.
    #[must_use]
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::NO_LIMIT,
        }
    }
}

/// The cache chain type the executor holds per cache id.
pub type ResultCache = Arc<dyn Cache<Value = Arc<Vec<Row>>>>;

/// Fingerprint of one cacheable invocation: statement id, paging bounds,
/// SQL text, every parameter value in order, and the environment id.
#[must_use]
pub fn create_cache_key(
    statement_id: &str,
    bounds: RowBounds,
    bound: &BoundSql,
    environment_id: Option<&str>,
) -> CacheKey {
    let mut key = CacheKey::new();
    key.update(Value::Text(statement_id.to_string()));
    key.update(Value::Int(i64::try_from(bounds.offset).unwrap_or(i64::MAX)));
    key.update(Value::Int(i64::try_from(bounds.limit).unwrap_or(i64::MAX)));
    key.update(Value::Text(bound.sql.clone()));
    for value in &bound.values {
        key.update(value.clone());
    }
    match environment_id {
        Some(id) => key.update(Value::Text(id.to_string())),
        None => key.update(Value::Null),
    }
    key
}

/// Executes registered statements over a pool, a codec registry, and the
/// second-level caches statements are bound to.
pub struct Executor {
    pool: Pool,
    statements: StatementRegistry,
    codecs: CodecRegistry,
    caches: HashMap<String, ResultCache>,
    environment_id: Option<String>,
}

impl Executor {
    /// An executor over the given pool, statements, and codecs.
    #[must_use]
    pub fn new(pool: Pool, statements: StatementRegistry, codecs: CodecRegistry) -> Self {
        Self {
            pool,
            statements,
            codecs,
            caches: HashMap::new(),
            environment_id: None,
        }
    }

    /// Set the environment id contributed to every cache key.
    #[must_use]
    pub fn environment_id(mut self, id: impl Into<String>) -> Self {
        self.environment_id = Some(id.into());
        self
    }

    /// Install a cache chain; statements reference it by its id.
    pub fn register_cache(&mut self, cache: ResultCache) {
        self.caches.insert(cache.id().to_string(), cache);
    }

    /// The statement registry.
    #[must_use]
    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    /// The cache chain registered under `id`, if any.
    #[must_use]
    pub fn cache(&self, id: &str) -> Option<&ResultCache> {
        self.caches.get(id)
    }

    /// The pool this executor runs on.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run a select and return all its rows.
    pub async fn query(&self, statement_id: &str, args: Value) -> Result<Vec<Row>, ExecutorError> {
        self.query_bounded(statement_id, args, RowBounds::default())
            .await
    }

    /// Run a select with paging bounds.
    pub async fn query_bounded(
        &self,
        statement_id: &str,
        args: Value,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError> {
        let statement = self.statements.require(statement_id)?;
        let conn = self.pool.acquire().await?;
        let result = self.run_select(&statement, &args, bounds, &conn).await;
        // Cleanup step: the connection goes back on every path.
        self.pool.release(conn).await;
        result
    }

    /// Run a select forward-only, feeding each row to `handler`.
    ///
    /// The cursor path never consults or populates the cache.
    pub async fn query_with_handler(
        &self,
        statement_id: &str,
        args: Value,
        bounds: RowBounds,
        handler: &mut dyn FnMut(Row),
    ) -> Result<usize, ExecutorError> {
        let statement = self.statements.require(statement_id)?;
        let conn = self.pool.acquire().await?;
        let result = async {
            let bound = statement
                .source
                .bind(&args, self.environment_id.as_deref())?;
            self.flush_if_required(&statement).await;
            let rows = self.run_on_connection(&conn, &bound, bounds).await?;
            let count = rows.len();
            for row in rows {
                handler(row);
            }
            Ok(count)
        }
        .await;
        self.pool.release(conn).await;
        result
    }

    /// Run a mutation and return its affected-row count.
    pub async fn update(&self, statement_id: &str, args: Value) -> Result<u64, ExecutorError> {
        let statement = self.statements.require(statement_id)?;
        if statement.kind == CommandKind::Flush {
            return self.flush().await;
        }
        let conn = self.pool.acquire().await?;
        let result = self.run_update(&statement, &args, &conn).await;
        self.pool.release(conn).await;
        result
    }

    /// Flush pending batched statements.
    ///
    /// This executor runs every statement immediately, so there is never
    /// anything pending.
    pub async fn flush(&self) -> Result<u64, ExecutorError> {
        Ok(0)
    }

    async fn run_select(
        &self,
        statement: &StatementDefinition,
        args: &Value,
        bounds: RowBounds,
        conn: &PooledConnection,
    ) -> Result<Vec<Row>, ExecutorError> {
        let bound = statement
            .source
            .bind(args, self.environment_id.as_deref())?;
        self.flush_if_required(statement).await;

        let cache = statement
            .cache
            .as_deref()
            .filter(|_| statement.use_cache)
            .and_then(|id| self.caches.get(id));
        let Some(cache) = cache else {
            return self.run_on_connection(conn, &bound, bounds).await;
        };

        let key = create_cache_key(
            &statement.id,
            bounds,
            &bound,
            self.environment_id.as_deref(),
        );
        if let Some(rows) = cache.get(&key).await? {
            tracing::debug!(statement = %statement.id, "cache hit");
            return Ok((*rows).clone());
        }
        tracing::trace!(statement = %statement.id, "cache miss");
        match self.run_on_connection(conn, &bound, bounds).await {
            Ok(rows) => {
                cache.put(key, Arc::new(rows.clone())).await?;
                Ok(rows)
            }
            Err(err) => {
                // Unblocks waiters held by a blocking decorator's miss lock.
                let _ = cache.remove(&key).await;
                Err(err)
            }
        }
    }

    async fn run_update(
        &self,
        statement: &StatementDefinition,
        args: &Value,
        conn: &PooledConnection,
    ) -> Result<u64, ExecutorError> {
        let bound = statement
            .source
            .bind(args, self.environment_id.as_deref())?;
        self.flush_if_required(statement).await;
        let params = self.encode_params(&bound)?;
        let affected = conn.execute(&bound.sql, &params).await?;
        tracing::debug!(statement = %statement.id, affected, "executed mutation");
        Ok(affected)
    }

    /// Clear the statement's cache when it is marked flushing.
    async fn flush_if_required(&self, statement: &StatementDefinition) {
        if !statement.flush_cache {
            return;
        }
        if let Some(cache) = statement.cache.as_deref().and_then(|id| self.caches.get(id)) {
            tracing::debug!(statement = %statement.id, cache = cache.id(), "flushing cache");
            cache.clear().await;
        }
    }

    async fn run_on_connection(
        &self,
        conn: &PooledConnection,
        bound: &BoundSql,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError> {
        let params = self.encode_params(bound)?;
        let rows = conn.query(&bound.sql, &params).await?;
        let page = rows
            .into_iter()
            .skip(bounds.offset)
            .take(bounds.limit)
            .map(|row| row.map_values(|_, value| self.codecs.decode(&value, None)))
            .collect::<Result<Vec<Row>, _>>()?;
        Ok(page)
    }

    /// Encode outbound parameter values per their declared column types.
    fn encode_params(&self, bound: &BoundSql) -> Result<Vec<Value>, ExecutorError> {
        bound
            .parameters
            .iter()
            .zip(&bound.values)
            .map(|(mapping, value)| Ok(self.codecs.encode(value, mapping.column_type)?))
            .collect()
    }
}
