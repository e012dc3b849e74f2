//! Parameter placeholder scanning.
//!
//! After the dynamic tree has produced its SQL text, `#{…}` placeholders
//! are rewritten left to right into positional `?` markers while their
//! metadata is recorded in the same order.

use std::str::FromStr;

use sqlbind_types::ColumnType;

use crate::error::BindingError;

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMode {
    /// Bound into the statement (the default).
    #[default]
    In,
    /// Produced by the statement (stored procedures).
    Out,
    /// Both bound and produced.
    InOut,
}

/// Metadata of one `#{…}` placeholder, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapping {
    /// Property path the value is read from.
    pub property: String,
    /// Declared conversion type, if any (`type=` attribute).
    pub column_type: Option<ColumnType>,
    /// Declared numeric scale (`scale=` attribute).
    pub numeric_scale: Option<u32>,
    /// Parameter direction (`mode=` attribute).
    pub mode: ParameterMode,
}

impl ParameterMapping {
    /// A plain input mapping for a property.
    #[must_use]
    pub fn input(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            column_type: None,
            numeric_scale: None,
            mode: ParameterMode::In,
        }
    }
}

/// Replace every `#{…}` with `?`, collecting mappings in order.
pub fn scan_placeholders(sql: &str) -> Result<(String, Vec<ParameterMapping>), BindingError> {
    let mut out = String::with_capacity(sql.len());
    let mut mappings = Vec::new();
    let mut rest = sql;
    while let Some(start) = rest.find("#{") {
        out.push_str(&rest[..start]);
        let body_start = start + 2;
        let Some(len) = rest[body_start..].find('}') else {
            return Err(BindingError::MalformedPlaceholder {
                placeholder: rest[body_start..].to_string(),
            });
        };
        let body = &rest[body_start..body_start + len];
        mappings.push(parse_placeholder(body)?);
        out.push('?');
        rest = &rest[body_start + len + 1..];
    }
    out.push_str(rest);
    Ok((out, mappings))
}

fn parse_placeholder(body: &str) -> Result<ParameterMapping, BindingError> {
    let malformed = || BindingError::MalformedPlaceholder {
        placeholder: body.to_string(),
    };
    let mut parts = body.split(',');
    let property = parts.next().map(str::trim).unwrap_or_default();
    if property.is_empty() {
        return Err(malformed());
    }
    let mut mapping = ParameterMapping::input(property);
    for attr in parts {
        let (key, value) = attr.split_once('=').ok_or_else(malformed)?;
        match key.trim() {
            "type" => {
                mapping.column_type =
                    Some(ColumnType::from_str(value.trim()).map_err(|_| malformed())?);
            }
            "scale" => {
                mapping.numeric_scale = Some(value.trim().parse().map_err(|_| malformed())?);
            }
            "mode" => {
                mapping.mode = match value.trim() {
                    "IN" | "in" => ParameterMode::In,
                    "OUT" | "out" => ParameterMode::Out,
                    "INOUT" | "inout" => ParameterMode::InOut,
                    _ => return Err(malformed()),
                };
            }
            _ => return Err(malformed()),
        }
    }
    Ok(mapping)
}
