//! Column type vocabulary for parameter mappings and codec lookup.

use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// Declared column type of a statement parameter or result column.
///
/// This mirrors the usual SQL type buckets rather than any one vendor's
/// catalog; drivers map their native types onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// BOOLEAN / BIT.
    Boolean,
    /// INTEGER / SMALLINT / TINYINT.
    Integer,
    /// BIGINT.
    BigInt,
    /// DOUBLE / FLOAT / REAL.
    Double,
    /// NUMERIC / DECIMAL (carried as a float with an explicit scale).
    Numeric,
    /// CHAR (fixed-width character data).
    Char,
    /// VARCHAR / TEXT.
    Varchar,
    /// BLOB / VARBINARY.
    Blob,
    /// DATE / TIME / TIMESTAMP, carried as ISO-8601 text.
    Timestamp,
    /// Driver-specific type handled by a registered codec.
    Other,
}

impl ColumnType {
    /// The fallback type consulted when no codec is registered for `self`.
    ///
    /// The lookup walk in [`crate::CodecRegistry`] follows this chain until
    /// it finds a registered codec or runs out of fallbacks.
    #[must_use]
    pub fn fallback(self) -> Option<ColumnType> {
        match self {
            ColumnType::Integer => Some(ColumnType::BigInt),
            ColumnType::Numeric => Some(ColumnType::Double),
            ColumnType::Char | ColumnType::Timestamp => Some(ColumnType::Varchar),
            ColumnType::Other => Some(ColumnType::Varchar),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Blob => "BLOB",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Other => "OTHER",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ColumnType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BOOLEAN" | "BIT" => Ok(ColumnType::Boolean),
            "INTEGER" | "INT" | "SMALLINT" | "TINYINT" => Ok(ColumnType::Integer),
            "BIGINT" => Ok(ColumnType::BigInt),
            "DOUBLE" | "FLOAT" | "REAL" => Ok(ColumnType::Double),
            "NUMERIC" | "DECIMAL" => Ok(ColumnType::Numeric),
            "CHAR" => Ok(ColumnType::Char),
            "VARCHAR" | "TEXT" => Ok(ColumnType::Varchar),
            "BLOB" | "VARBINARY" => Ok(ColumnType::Blob),
            "TIMESTAMP" | "DATE" | "TIME" => Ok(ColumnType::Timestamp),
            "OTHER" => Ok(ColumnType::Other),
            other => Err(TypeError::UnknownColumnType(other.to_string())),
        }
    }
}
