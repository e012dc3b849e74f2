//! # sqlbind-types
//!
//! Value model and codec registry for the sqlbind persistence core.
//!
//! This crate defines the self-describing [`Value`] that flows between the
//! statement binder (outbound parameters) and row materialization (inbound
//! columns), the [`ColumnType`] vocabulary used by parameter mappings, and
//! the pluggable [`CodecRegistry`] that converts between the two.

pub mod codec;
pub mod column;
pub mod error;
pub mod row;
pub mod value;

pub use codec::{CodecRegistry, TypeCodec};
pub use column::ColumnType;
pub use error::TypeError;
pub use row::{Column, Row};
pub use value::Value;
