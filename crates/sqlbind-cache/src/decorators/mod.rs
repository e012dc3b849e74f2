//! Cache policy decorators.
//!
//! Each decorator wraps exactly one inner cache and reuses its id. The
//! conventional composition, outermost first, is blocking → FIFO/LRU →
//! soft → base.

pub mod blocking;
pub mod fifo;
pub mod lru;
pub mod soft;
