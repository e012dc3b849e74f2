//! The executor's error roll-up.

use thiserror::Error;

use sqlbind_cache::CacheError;
use sqlbind_mapping::BindingError;
use sqlbind_pool::PoolError;
use sqlbind_types::TypeError;

/// Everything that can go wrong executing a mapped statement.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Connection acquisition or use failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The second-level cache failed (lock timeout).
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Statement resolution or SQL binding failed.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Parameter or result value conversion failed.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A single-result method matched more than one row.
    #[error("expected at most {expected} result, got {actual}")]
    TooManyResults {
        /// How many rows the return shape allows.
        expected: usize,
        /// How many rows the statement produced.
        actual: usize,
    },

    /// The result cannot satisfy the method's declared return contract.
    #[error("return contract violation: {message}")]
    ContractViolation {
        /// What the contract required.
        message: String,
    },
}
