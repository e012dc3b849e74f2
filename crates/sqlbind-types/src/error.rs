//! Type conversion errors.

use thiserror::Error;

/// Errors raised by codec lookup and value conversion.
#[derive(Debug, Error)]
pub enum TypeError {
    /// A value could not be converted to or from the declared column type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What the codec expected.
        expected: &'static str,
        /// Description of the offending value.
        actual: String,
    },

    /// A column type name that no codec understands.
    #[error("unknown column type: {0}")]
    UnknownColumnType(String),

    /// No codec is registered for the declared type or any of its fallbacks.
    #[error("no codec registered for column type {0}")]
    NoCodec(String),

    /// Numeric value does not fit the declared width.
    #[error("numeric overflow converting {value} to {target}")]
    NumericOverflow {
        /// The source value.
        value: String,
        /// The target type.
        target: &'static str,
    },
}
