//! Mapper method dispatch and return-shape coercion.
//!
//! A mapper method is the caller-facing identity of a statement: an
//! interface name, a method name, and the interface that declares the
//! method. Execution resolves that identity to a registered statement id,
//! runs it, and coerces the raw result into the method's declared shape.

use std::collections::BTreeMap;

use sqlbind_mapping::{BindingError, CommandKind, StatementResolver};
use sqlbind_types::{Row, Value};

use crate::error::ExecutorError;
use crate::executor::{Executor, RowBounds};

/// Numeric shape a mutation's affected-row count is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffectedKind {
    /// 32-bit count; overflow is a contract violation.
    Int,
    /// 64-bit count.
    Long,
    /// True when at least one row was affected.
    Bool,
}

/// The declared return shape of a mapper method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// No value.
    Void,
    /// At most one row. A primitive shape cannot absorb a null result.
    One {
        /// Whether the declared return cannot represent null.
        primitive: bool,
    },
    /// All rows, in order.
    Many,
    /// Rows keyed by the named column.
    MapByKey(String),
    /// Forward-only row consumption; requires a row handler.
    Cursor,
    /// A mutation's affected-row count.
    Affected(AffectedKind),
}

/// One interface method bound to a mapped statement.
pub struct MapperMethod {
    interface: String,
    method: String,
    declaring: String,
    shape: ReturnShape,
}

impl MapperMethod {
    /// A method declared directly on `interface`.
    #[must_use]
    pub fn new(
        interface: impl Into<String>,
        method: impl Into<String>,
        shape: ReturnShape,
    ) -> Self {
        let interface = interface.into();
        Self {
            declaring: interface.clone(),
            interface,
            method: method.into(),
            shape,
        }
    }

    /// Mark the method as declared on an ancestor interface.
    #[must_use]
    pub fn declared_in(mut self, declaring: impl Into<String>) -> Self {
        self.declaring = declaring.into();
        self
    }

    fn resolve_id(
        &self,
        executor: &Executor,
        resolver: &StatementResolver,
    ) -> Result<String, ExecutorError> {
        resolver
            .resolve(
                executor.statements(),
                &self.interface,
                &self.method,
                &self.declaring,
            )
            .ok_or_else(|| {
                ExecutorError::Binding(BindingError::StatementNotFound {
                    id: format!("{}.{}", self.interface, self.method),
                })
            })
    }

    /// Execute the method and coerce the result into its return shape.
    pub async fn execute(
        &self,
        executor: &Executor,
        resolver: &StatementResolver,
        args: Value,
    ) -> Result<Value, ExecutorError> {
        let id = self.resolve_id(executor, resolver)?;
        let statement = executor.statements().require(&id)?;
        match &self.shape {
            ReturnShape::Void => {
                if statement.kind == CommandKind::Select {
                    executor.query(&id, args).await?;
                } else {
                    executor.update(&id, args).await?;
                }
                Ok(Value::Null)
            }
            ReturnShape::One { primitive } => {
                let rows = executor.query(&id, args).await?;
                match rows.len() {
                    0 => {
                        if *primitive {
                            Err(ExecutorError::ContractViolation {
                                message: format!(
                                    "{id} returned null for a primitive return shape"
                                ),
                            })
                        } else {
                            Ok(Value::Null)
                        }
                    }
                    1 => Ok(rows
                        .into_iter()
                        .next()
                        .map_or(Value::Null, Row::into_value)),
                    actual => Err(ExecutorError::TooManyResults {
                        expected: 1,
                        actual,
                    }),
                }
            }
            ReturnShape::Many => {
                let rows = executor.query(&id, args).await?;
                Ok(Value::Array(rows.into_iter().map(Row::into_value).collect()))
            }
            ReturnShape::MapByKey(column) => {
                let rows = executor.query(&id, args).await?;
                let mut entries = BTreeMap::new();
                for row in rows {
                    let Some(key) = row.get_by_name(column) else {
                        return Err(ExecutorError::ContractViolation {
                            message: format!("{id} rows carry no key column {column:?}"),
                        });
                    };
                    entries.insert(key.to_string(), row.into_value());
                }
                Ok(Value::Map(entries))
            }
            ReturnShape::Cursor => Err(ExecutorError::ContractViolation {
                message: format!("{id} is a cursor method and needs a row handler"),
            }),
            ReturnShape::Affected(kind) => {
                let affected = executor.update(&id, args).await?;
                coerce_affected(&id, affected, *kind)
            }
        }
    }

    /// Execute a cursor-shaped method, feeding rows to `handler`.
    pub async fn execute_with_handler(
        &self,
        executor: &Executor,
        resolver: &StatementResolver,
        args: Value,
        bounds: RowBounds,
        handler: &mut dyn FnMut(Row),
    ) -> Result<usize, ExecutorError> {
        let id = self.resolve_id(executor, resolver)?;
        executor
            .query_with_handler(&id, args, bounds, handler)
            .await
    }
}

fn coerce_affected(id: &str, affected: u64, kind: AffectedKind) -> Result<Value, ExecutorError> {
    match kind {
        AffectedKind::Bool => Ok(Value::Bool(affected > 0)),
        AffectedKind::Long => Ok(Value::Int(i64::try_from(affected).unwrap_or(i64::MAX))),
        AffectedKind::Int => match i32::try_from(affected) {
            Ok(count) => Ok(Value::Int(i64::from(count))),
            Err(_) => Err(ExecutorError::ContractViolation {
                message: format!("{id} affected {affected} rows, too many for an int return"),
            }),
        },
    }
}
