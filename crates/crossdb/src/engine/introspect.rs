//! Catalog lookups.
//!
//! Existence checks run the dialect's catalog query and read its `CNT`
//! column. They are reads, so they also run in simulation and read-only
//! mode, and they never reach the query logger.

use std::panic::Location;

use crate::core::schema::Column;
use crate::core::traits::{CatalogQuery, Dialect};
use crate::core::value::SqlValue;
use crate::error::{DbError, Result};

use super::Engine;

impl<D: Dialect> Engine<D> {
    fn catalog_count(&mut self, query: &CatalogQuery) -> Result<bool> {
        let mut cursor = self.run(&query.sql, &query.params, None, false, Location::caller())?;
        if !cursor.advance() {
            return Ok(false);
        }
        Ok(cursor.field("CNT").and_then(SqlValue::as_i64).unwrap_or(0) > 0)
    }

    pub(crate) fn table_exists_inner(&mut self, table: &str) -> Result<bool> {
        let query = self.dialect.table_exists_query(table);
        self.catalog_count(&query)
    }

    pub(crate) fn sequence_exists_inner(&mut self, sequence: &str) -> Result<bool> {
        match self.dialect.sequence_exists_query(sequence) {
            Some(query) => self.catalog_count(&query),
            None => Ok(false),
        }
    }

    pub(crate) fn constraint_exists_inner(&mut self, table: &str, name: &str) -> Result<bool> {
        let query = self.dialect.constraint_exists_query(table, name);
        self.catalog_count(&query)
    }

    /// Column filled by an emulated auto-increment on `table`.
    pub(crate) fn auto_increment_column_inner(&mut self, table: &str) -> Result<Option<String>> {
        let Some(query) = self.dialect.auto_increment_column_query(table) else {
            return Ok(None);
        };
        let mut cursor = self.run(&query.sql, &query.params, None, false, Location::caller())?;
        if !cursor.advance() {
            return Ok(None);
        }
        Ok(cursor
            .field("COLUMN_NAME")
            .and_then(SqlValue::as_str)
            .map(str::to_string))
    }

    pub(crate) fn column_info_inner(
        &mut self,
        table: &str,
        column: &str,
    ) -> Result<Option<Column>> {
        let query = self.dialect.column_info_query(table, column);
        let mut cursor = self.run(&query.sql, &query.params, None, false, Location::caller())?;
        if !cursor.advance() {
            return Ok(None);
        }
        Ok(cursor
            .current()
            .and_then(|row| self.dialect.column_from_catalog(row)))
    }

    /// True when the table exists in the connected schema.
    pub fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.tracked(|engine| engine.table_exists_inner(table))
    }

    pub fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        self.tracked(|engine| {
            let query = engine.dialect.column_exists_query(table, column);
            engine.catalog_count(&query)
        })
    }

    pub fn index_exists(&mut self, table: &str, index: &str) -> Result<bool> {
        self.tracked(|engine| {
            let query = engine.dialect.index_exists_query(table, index);
            engine.catalog_count(&query)
        })
    }

    /// True when a named constraint (primary, unique or foreign key) exists
    /// on the table.
    pub fn constraint_exists(&mut self, table: &str, constraint: &str) -> Result<bool> {
        self.tracked(|engine| engine.constraint_exists_inner(table, constraint))
    }

    /// Always false for dialects without native sequences.
    pub fn sequence_exists(&mut self, sequence: &str) -> Result<bool> {
        self.tracked(|engine| engine.sequence_exists_inner(sequence))
    }

    pub fn table_has_primary_key(&mut self, table: &str) -> Result<bool> {
        self.tracked(|engine| {
            let query = engine.dialect.primary_key_exists_query(table);
            engine.catalog_count(&query)
        })
    }

    /// Current definition of a column, mapped back to a logical type.
    ///
    /// `None` when the column does not exist or its native type has no
    /// logical counterpart. The mapping is lossy (e.g. Oracle
    /// `VARCHAR2(4000)` reads back as `VARCHAR(4000)`, never `TEXT`).
    pub fn column_info(&mut self, table: &str, column: &str) -> Result<Option<Column>> {
        self.tracked(|engine| engine.column_info_inner(table, column))
    }

    /// Like [`column_info`](Self::column_info) but a missing column is an
    /// error.
    pub fn require_column_info(&mut self, table: &str, column: &str) -> Result<Column> {
        self.tracked(|engine| {
            engine
                .column_info_inner(table, column)?
                .ok_or_else(|| DbError::column_not_found(table, column))
        })
    }
}
