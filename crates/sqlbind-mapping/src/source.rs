//! SQL sources and the bound SQL they produce.
//!
//! A fully static tree is expanded and scanned exactly once, at
//! registration; binding it is then just value resolution against the
//! cached template. A dynamic tree is re-evaluated per call.

use sqlbind_types::Value;

use crate::context::DynamicContext;
use crate::error::BindingError;
use crate::nodes::SqlNode;
use crate::scanner::{ParameterMapping, ParameterMode, scan_placeholders};

/// Executable SQL plus its ordered parameters.
#[derive(Debug, Clone)]
pub struct BoundSql {
    /// SQL text with positional `?` placeholders.
    pub sql: String,
    /// Placeholder metadata, in placeholder order.
    pub parameters: Vec<ParameterMapping>,
    /// Resolved parameter values, parallel to `parameters`.
    pub values: Vec<Value>,
}

/// A statement's SQL, pre-expanded when possible.
pub enum SqlSource {
    /// Expanded and scanned once at registration.
    Static {
        /// The cached positional SQL template.
        sql: String,
        /// The cached placeholder metadata.
        parameters: Vec<ParameterMapping>,
    },
    /// Re-evaluated against the arguments on every call.
    Dynamic {
        /// Root of the fragment tree.
        root: SqlNode,
    },
}

impl SqlSource {
    /// Build a source from a fragment tree, pre-expanding static trees.
    pub fn new(root: SqlNode) -> Result<Self, BindingError> {
        if root.is_dynamic() {
            return Ok(SqlSource::Dynamic { root });
        }
        let mut ctx = DynamicContext::new(Value::Null, None);
        root.apply(&mut ctx)?;
        let (sql, parameters) = scan_placeholders(ctx.sql())?;
        Ok(SqlSource::Static { sql, parameters })
    }

    /// Whether binding re-evaluates the tree per call.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, SqlSource::Dynamic { .. })
    }

    /// Produce executable SQL and ordered parameter values for one call.
    pub fn bind(
        &self,
        parameter: &Value,
        database_id: Option<&str>,
    ) -> Result<BoundSql, BindingError> {
        match self {
            SqlSource::Static { sql, parameters } => {
                let ctx = DynamicContext::new(parameter.clone(), database_id);
                let values = resolve_values(parameters, &ctx);
                Ok(BoundSql {
                    sql: sql.clone(),
                    parameters: parameters.clone(),
                    values,
                })
            }
            SqlSource::Dynamic { root } => {
                let mut ctx = DynamicContext::new(parameter.clone(), database_id);
                root.apply(&mut ctx)?;
                let (sql, parameters) = scan_placeholders(ctx.sql())?;
                tracing::debug!(sql = %sql, "bound dynamic statement");
                let values = resolve_values(&parameters, &ctx);
                Ok(BoundSql {
                    sql,
                    parameters,
                    values,
                })
            }
        }
    }
}

/// Missing properties bind as NULL; OUT parameters carry no inbound value.
fn resolve_values(parameters: &[ParameterMapping], ctx: &DynamicContext) -> Vec<Value> {
    parameters
        .iter()
        .map(|mapping| {
            if mapping.mode == ParameterMode::Out {
                return Value::Null;
            }
            ctx.lookup(&mapping.property).cloned().unwrap_or(Value::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn args(entries: Vec<(&str, Value)>) -> Value {
        let mut root = BTreeMap::new();
        for (name, value) in entries {
            root.insert(name.to_string(), value);
        }
        Value::Map(root)
    }

    #[test]
    fn test_static_source_expands_once_and_rebinds() {
        let source = SqlSource::new(SqlNode::Static(
            "SELECT * FROM users WHERE id = #{id}".to_string(),
        ))
        .expect("source");
        assert!(!source.is_dynamic());

        let first = source
            .bind(&args(vec![("id", Value::Int(1))]), None)
            .expect("bind");
        let second = source
            .bind(&args(vec![("id", Value::Int(2))]), None)
            .expect("bind");

        assert_eq!(first.sql, "SELECT * FROM users WHERE id = ?");
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.values, vec![Value::Int(1)]);
        assert_eq!(second.values, vec![Value::Int(2)]);
    }

    #[test]
    fn test_dynamic_source_resolves_foreach_values() {
        let source = SqlSource::new(SqlNode::Mixed(vec![
            SqlNode::Static("SELECT * FROM users".to_string()),
            SqlNode::Foreach {
                collection: "ids".to_string(),
                item: Some("id".to_string()),
                index: None,
                open: Some("WHERE id IN (".to_string()),
                close: Some(")".to_string()),
                separator: Some(",".to_string()),
                contents: Box::new(SqlNode::Static("#{id}".to_string())),
            },
        ]))
        .expect("source");
        assert!(source.is_dynamic());

        let bound = source
            .bind(
                &args(vec![(
                    "ids",
                    Value::Array(vec![Value::Int(4), Value::Int(5)]),
                )]),
                None,
            )
            .expect("bind");
        assert_eq!(bound.sql, "SELECT * FROM users WHERE id IN ( ? , ? )");
        assert_eq!(bound.values, vec![Value::Int(4), Value::Int(5)]);
    }

    #[test]
    fn test_missing_property_binds_null() {
        let source = SqlSource::new(SqlNode::Static(
            "INSERT INTO t (a, b) VALUES (#{a}, #{b})".to_string(),
        ))
        .expect("source");
        let bound = source
            .bind(&args(vec![("a", Value::Int(1))]), None)
            .expect("bind");
        assert_eq!(bound.values, vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn test_scalar_parameter_via_parameter_key() {
        let source = SqlSource::new(SqlNode::Static(
            "SELECT * FROM users WHERE id = #{_parameter}".to_string(),
        ))
        .expect("source");
        let bound = source.bind(&Value::Int(9), None).expect("bind");
        assert_eq!(bound.values, vec![Value::Int(9)]);
    }
}
