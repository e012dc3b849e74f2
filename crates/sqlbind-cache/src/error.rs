//! Cache errors.

use thiserror::Error;

/// Errors raised by the cache decorator chain.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A blocking-cache key lock could not be acquired within the timeout.
    #[error("couldn't get a lock in {millis}ms for key {key} at cache {cache}")]
    LockTimeout {
        /// Display form of the contested key.
        key: String,
        /// The configured wait bound in milliseconds.
        millis: u64,
        /// Id of the cache whose lock timed out.
        cache: String,
    },
}
