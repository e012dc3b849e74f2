//! # sqlbind-mapping
//!
//! Statement model and dynamic SQL binding for the sqlbind persistence
//! core.
//!
//! A statement is registered under a namespace-qualified id with a
//! [`SqlSource`]: either a static template expanded once, or a dynamic
//! fragment tree ([`SqlNode`]) re-evaluated per call against a
//! [`DynamicContext`]. Binding produces [`BoundSql`]: positional SQL plus
//! the ordered parameter metadata and values. [`StatementResolver`] maps an
//! interface method call onto a registered id across interface
//! inheritance.

pub mod context;
pub mod error;
pub mod expr;
pub mod nodes;
pub mod resolver;
pub mod scanner;
pub mod source;
pub mod statement;

pub use context::{DATABASE_ID_KEY, DynamicContext, PARAMETER_KEY};
pub use error::BindingError;
pub use expr::{Expr, ExprCache};
pub use nodes::SqlNode;
pub use resolver::{InterfaceGraph, StatementResolver};
pub use scanner::{ParameterMapping, ParameterMode, scan_placeholders};
pub use source::{BoundSql, SqlSource};
pub use statement::{CommandKind, StatementDefinition, StatementRegistry};
