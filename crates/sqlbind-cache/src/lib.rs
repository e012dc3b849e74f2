//! # sqlbind-cache
//!
//! Second-level result cache for the sqlbind persistence core.
//!
//! The cache is a linear chain of decorators over a base in-memory store,
//! each implementing the same [`Cache`] contract:
//!
//! - [`PerpetualCache`]: unbounded hash-map base cache
//! - [`FifoCache`]: insertion-order eviction
//! - [`LruCache`]: recency eviction, gets touch
//! - [`SoftCache`]: weak-reference values with a strong-hold ring
//! - [`BlockingCache`]: at most one concurrent recomputation per key
//!
//! Composition order matters; [`CacheBuilder`] assembles the standard
//! blocking → eviction → soft → base ordering. [`CacheKey`] is the
//! composite, order-sensitive fingerprint identifying one cacheable
//! statement invocation.

pub mod builder;
pub mod cache;
pub mod decorators;
pub mod error;
pub mod key;

pub use builder::{CacheBuilder, EvictionPolicy};
pub use cache::{Cache, PerpetualCache};
pub use decorators::blocking::BlockingCache;
pub use decorators::fifo::FifoCache;
pub use decorators::lru::LruCache;
pub use decorators::soft::{SoftCache, SoftEntry};
pub use error::CacheError;
pub use key::CacheKey;
