//! # sqlbind-executor
//!
//! Execution orchestration for the sqlbind persistence core: takes a
//! registered statement through connection acquisition, SQL binding,
//! second-level cache probing, execution, and row materialization, and
//! coerces results into the calling method's declared return shape.

pub mod error;
pub mod executor;
pub mod mapper;

pub use error::ExecutorError;
pub use executor::{Executor, ResultCache, RowBounds, create_cache_key};
pub use mapper::{AffectedKind, MapperMethod, ReturnShape};
