//! Codec registry: conversion between runtime values and column values.
//!
//! The registry maps a declared [`ColumnType`] to a [`TypeCodec`]. Lookup
//! walks the declared type's fallback chain, so registering a codec for
//! `Varchar` also covers `Char` and `Timestamp` unless more specific codecs
//! are installed. An unspecified declared type uses the identity codec.

use std::collections::HashMap;
use std::sync::Arc;

use crate::column::ColumnType;
use crate::error::TypeError;
use crate::value::Value;

/// Converts between runtime values and column values for one column type.
pub trait TypeCodec: Send + Sync {
    /// Convert an outbound parameter value into the column representation.
    fn encode(&self, value: &Value) -> Result<Value, TypeError>;

    /// Convert an inbound column value into the runtime representation.
    fn decode(&self, value: &Value) -> Result<Value, TypeError>;
}

/// Registry of codecs keyed by declared column type.
pub struct CodecRegistry {
    codecs: HashMap<ColumnType, Arc<dyn TypeCodec>>,
}

impl CodecRegistry {
    /// Create a registry pre-populated with the standard codecs.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(ColumnType::Boolean, Arc::new(BooleanCodec));
        registry.register(ColumnType::BigInt, Arc::new(IntegerCodec));
        registry.register(ColumnType::Double, Arc::new(DoubleCodec));
        registry.register(ColumnType::Varchar, Arc::new(TextCodec));
        registry.register(ColumnType::Blob, Arc::new(BytesCodec));
        registry
    }

    /// Register or replace the codec for a column type.
    pub fn register(&mut self, column_type: ColumnType, codec: Arc<dyn TypeCodec>) {
        self.codecs.insert(column_type, codec);
    }

    /// Find the codec for a declared type, walking the fallback chain.
    pub fn lookup(&self, column_type: ColumnType) -> Result<&Arc<dyn TypeCodec>, TypeError> {
        let mut current = Some(column_type);
        while let Some(ty) = current {
            if let Some(codec) = self.codecs.get(&ty) {
                return Ok(codec);
            }
            current = ty.fallback();
        }
        Err(TypeError::NoCodec(column_type.to_string()))
    }

    /// Encode an outbound parameter value.
    ///
    /// A `None` declared type passes the value through unchanged; NULL is
    /// always passed through.
    pub fn encode(
        &self,
        value: &Value,
        declared: Option<ColumnType>,
    ) -> Result<Value, TypeError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match declared {
            Some(ty) => self.lookup(ty)?.encode(value),
            None => Ok(value.clone()),
        }
    }

    /// Decode an inbound column value.
    pub fn decode(
        &self,
        value: &Value,
        declared: Option<ColumnType>,
    ) -> Result<Value, TypeError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match declared {
            Some(ty) => self.lookup(ty)?.decode(value),
            None => Ok(value.clone()),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct BooleanCodec;

impl TypeCodec for BooleanCodec {
    fn encode(&self, value: &Value) -> Result<Value, TypeError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Int(i) => Ok(Value::Bool(*i != 0)),
            other => Err(TypeError::TypeMismatch {
                expected: "bool",
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn decode(&self, value: &Value) -> Result<Value, TypeError> {
        self.encode(value)
    }
}

struct IntegerCodec;

impl TypeCodec for IntegerCodec {
    fn encode(&self, value: &Value) -> Result<Value, TypeError> {
        match value {
            Value::Int(_) => Ok(value.clone()),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                Ok(Value::Int(*f as i64))
            }
            Value::Float(f) => Err(TypeError::NumericOverflow {
                value: f.to_string(),
                target: "bigint",
            }),
            other => Err(TypeError::TypeMismatch {
                expected: "integer",
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn decode(&self, value: &Value) -> Result<Value, TypeError> {
        self.encode(value)
    }
}

struct DoubleCodec;

impl TypeCodec for DoubleCodec {
    fn encode(&self, value: &Value) -> Result<Value, TypeError> {
        match value {
            Value::Float(_) => Ok(value.clone()),
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            other => Err(TypeError::TypeMismatch {
                expected: "float",
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn decode(&self, value: &Value) -> Result<Value, TypeError> {
        self.encode(value)
    }
}

struct TextCodec;

impl TypeCodec for TextCodec {
    fn encode(&self, value: &Value) -> Result<Value, TypeError> {
        match value {
            Value::Text(_) => Ok(value.clone()),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
                Ok(Value::Text(value.to_string()))
            }
            other => Err(TypeError::TypeMismatch {
                expected: "text",
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn decode(&self, value: &Value) -> Result<Value, TypeError> {
        match value {
            Value::Text(_) => Ok(value.clone()),
            other => Err(TypeError::TypeMismatch {
                expected: "text",
                actual: other.type_name().to_string(),
            }),
        }
    }
}

struct BytesCodec;

impl TypeCodec for BytesCodec {
    fn encode(&self, value: &Value) -> Result<Value, TypeError> {
        match value {
            Value::Bytes(_) => Ok(value.clone()),
            other => Err(TypeError::TypeMismatch {
                expected: "bytes",
                actual: other.type_name().to_string(),
            }),
        }
    }

    fn decode(&self, value: &Value) -> Result<Value, TypeError> {
        self.encode(value)
    }
}
