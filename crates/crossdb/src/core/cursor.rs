//! Materialized query results.
//!
//! Backends read the whole result set before returning, so a [`Cursor`]
//! owns no driver state and stays valid after the connection moves on.
//! Column names are upper-cased once; field lookups are case-insensitive
//! on every dialect.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::value::SqlValue;

/// Upper-cased column name to position, shared by all rows of a cursor.
#[derive(Debug, Default)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_uppercase())
            .collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // first occurrence wins for duplicate names in joins
            positions.entry(name.clone()).or_insert(i);
        }
        Self { names, positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&name.to_uppercase()).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A single result row.
#[derive(Debug, Clone)]
pub struct Row {
    index: Arc<ColumnIndex>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(index: Arc<ColumnIndex>, values: Vec<SqlValue>) -> Self {
        Self { index, values }
    }

    /// Value of a column by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.index.position(name).and_then(|i| self.values.get(i))
    }

    /// Value by position.
    pub fn value(&self, pos: usize) -> Option<&SqlValue> {
        self.values.get(pos)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(SqlValue::as_str)
    }

    /// Text rendering of any non-NULL value.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|v| !v.is_null())
            .map(ToString::to_string)
    }

    pub fn column_names(&self) -> &[String] {
        self.index.names()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Forward-only result set.
#[derive(Debug, Default)]
pub struct Cursor {
    index: Arc<ColumnIndex>,
    rows: VecDeque<Vec<SqlValue>>,
    current: Option<Row>,
    affected_rows: u64,
}

impl Cursor {
    /// Cursor over a materialized result set.
    pub fn new<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            index: Arc::new(ColumnIndex::new(columns)),
            rows: rows.into(),
            current: None,
            affected_rows: 0,
        }
    }

    /// Result of a statement that returns no rows.
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }

    /// Empty cursor (simulated statements).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_affected_rows(mut self, affected_rows: u64) -> Self {
        self.affected_rows = affected_rows;
        self
    }

    /// Rows changed by a DML statement.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn column_names(&self) -> &[String] {
        self.index.names()
    }

    /// Move to the next row. Returns false when the cursor is exhausted.
    pub fn advance(&mut self) -> bool {
        self.current = self
            .rows
            .pop_front()
            .map(|values| Row::new(Arc::clone(&self.index), values));
        self.current.is_some()
    }

    /// Current row, after a successful [`advance`](Self::advance).
    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Field of the current row (case-insensitive).
    pub fn field(&self, name: &str) -> Option<&SqlValue> {
        self.current.as_ref().and_then(|row| row.get(name))
    }

    /// Rows not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows
            .pop_front()
            .map(|values| Row::new(Arc::clone(&self.index), values))
    }
}
