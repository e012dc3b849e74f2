//! The evaluation context dynamic SQL trees run against.

use std::collections::HashMap;

use sqlbind_types::Value;

/// Binding name under which the whole argument value is reachable.
pub const PARAMETER_KEY: &str = "_parameter";

/// Binding name carrying the environment/database id, when one is set.
pub const DATABASE_ID_KEY: &str = "_databaseId";

/// Mutable state threaded through one dynamic SQL evaluation.
///
/// Holds the name bindings visible to expressions and `${}` substitutions,
/// the SQL text assembled so far, and a per-evaluation counter used to mint
/// unique binding names for iteration items.
pub struct DynamicContext {
    bindings: HashMap<String, Value>,
    sql: String,
    unique_number: u32,
}

impl DynamicContext {
    /// Seed a context with the call's argument value.
    ///
    /// A map argument contributes each entry as a top-level binding; the
    /// whole value is always reachable as `_parameter`.
    #[must_use]
    pub fn new(parameter: Value, database_id: Option<&str>) -> Self {
        let mut bindings = HashMap::new();
        if let Value::Map(entries) = &parameter {
            for (name, value) in entries {
                bindings.insert(name.clone(), value.clone());
            }
        }
        if let Some(id) = database_id {
            bindings.insert(DATABASE_ID_KEY.to_string(), Value::Text(id.to_string()));
        }
        bindings.insert(PARAMETER_KEY.to_string(), parameter);
        Self {
            bindings,
            sql: String::new(),
            unique_number: 0,
        }
    }

    /// Add or replace a binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Resolve a dotted property path against the bindings.
    ///
    /// The first segment selects a binding; the rest walk into it.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.bindings.get(path) {
            return Some(value);
        }
        let (head, rest) = path.split_once('.')?;
        self.bindings.get(head)?.get_path(rest)
    }

    /// Append a SQL fragment followed by a single space.
    pub fn append_sql(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
        self.sql.push(' ');
    }

    /// The SQL text assembled so far, without the trailing space.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql.trim_end()
    }

    /// Length of the raw SQL buffer; pairs with [`split_sql_at`](Self::split_sql_at).
    #[must_use]
    pub(crate) fn sql_len(&self) -> usize {
        self.sql.len()
    }

    /// Take everything appended since `start`, leaving the buffer at `start`.
    pub(crate) fn split_sql_at(&mut self, start: usize) -> String {
        self.sql.split_off(start)
    }

    pub(crate) fn append_raw(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Next per-evaluation unique number, for minted binding names.
    pub fn unique_number(&mut self) -> u32 {
        let n = self.unique_number;
        self.unique_number += 1;
        n
    }
}
