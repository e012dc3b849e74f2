//! Row representation for query results.

use std::collections::BTreeMap;

use crate::value::Value;

/// A row from a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Vec<Column>,
    values: Vec<Value>,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column index.
    pub index: usize,
}

impl Row {
    /// Create a new row from column names and values.
    ///
    /// Panics are avoided by truncating to the shorter of the two inputs.
    #[must_use]
    pub fn new(names: Vec<String>, mut values: Vec<Value>) -> Self {
        let count = names.len().min(values.len());
        values.truncate(count);
        let columns = names
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(index, name)| Column { name, index })
            .collect();
        Self { columns, values }
    }

    /// Get a value by column index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name (case-insensitive, first match).
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Iterate over (column, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Value)> {
        self.columns.iter().zip(self.values.iter())
    }

    /// Convert the row into a named composite value.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut entries = BTreeMap::new();
        for (column, value) in self.columns.into_iter().zip(self.values) {
            entries.insert(column.name, value);
        }
        Value::Map(entries)
    }

    /// Map every value through `f`, preserving column metadata.
    pub fn map_values<F, E>(self, mut f: F) -> Result<Row, E>
    where
        F: FnMut(usize, Value) -> Result<Value, E>,
    {
        let mut values = Vec::with_capacity(self.values.len());
        for (i, value) in self.values.into_iter().enumerate() {
            values.push(f(i, value)?);
        }
        Ok(Row {
            columns: self.columns,
            values,
        })
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(7), Value::Text("kim".into())],
        )
    }

    #[test]
    fn test_get_by_name_is_case_insensitive() {
        let row = sample();
        assert_eq!(row.get_by_name("NAME"), Some(&Value::Text("kim".into())));
        assert_eq!(row.get_by_name("missing"), None);
    }

    #[test]
    fn test_into_value_produces_map() {
        let value = sample().into_value();
        assert_eq!(value.get_path("id"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_mismatched_lengths_truncate() {
        let row = Row::new(vec!["a".to_string()], vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(row.len(), 1);
    }
}
