//! Core traits for dialect-agnostic database access.
//!
//! - [`Dialect`]: SQL generation strategy (quoting, types, DDL, pagination,
//!   upserts, catalog queries). Pure, no I/O.
//! - [`Connection`]: one live native connection executing statements with
//!   named binds.
//! - [`Connector`]: opens [`Connection`]s for the engine's retry loop.
//!
//! # Design Patterns
//!
//! - **Strategy**: `Dialect` provides interchangeable SQL syntax rules
//! - **Template Method**: the engine drives multi-step operations
//!   (`create_table`, `create_schema`) and asks the dialect for each step

use crate::error::Result;

use super::cursor::{Cursor, Row};
use super::params::BindParams;
use super::schema::{Column, ColumnType, ForeignKey, Index, Sequence, Table};

/// Row window for paged queries.
///
/// `offset` is **1-based**: `Page { limit: Some(10), offset: Some(21) }`
/// returns rows 21..=30.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// First `limit` rows.
    pub fn first(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// Number of rows to skip (0-based).
    pub fn skip(&self) -> u64 {
        self.offset.map(|o| o.saturating_sub(1)).unwrap_or(0)
    }

    /// True when the page does not restrict the result.
    pub fn is_unbounded(&self) -> bool {
        self.limit.is_none() && self.skip() == 0
    }
}

/// Catalog lookup statement with its binds.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: BindParams,
}

impl CatalogQuery {
    pub fn new(sql: impl Into<String>, params: BindParams) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// How a list of statements is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPlan {
    /// One statement (e.g. an anonymous block), executed with the binds.
    Single(String),
    /// Multi-statement text without binds.
    Script(String),
    /// Statements executed one after another with the binds.
    Sequential(Vec<String>),
}

/// SQL syntax strategy for a database engine.
///
/// Implemented by `OracleDialect` and `MysqlDialect` and dispatched
/// statically through `DialectImpl` in the `drivers` module.
pub trait Dialect: Send + Sync {
    /// Dialect identifier ("oracle", "mysql").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Native type for a logical column type.
    fn column_type(&self, ty: &ColumnType) -> String;

    /// True when a backslash escapes the next character inside string
    /// literals.
    fn backslash_escapes(&self) -> bool {
        false
    }

    /// Keyword appended to auto-increment columns, if the dialect has one.
    fn auto_increment_keyword(&self) -> Option<&'static str> {
        None
    }

    /// Full column definition as used in CREATE TABLE / ADD COLUMN.
    fn column_definition(&self, col: &Column) -> String {
        let mut def = format!(
            "{} {}",
            self.quote_ident(&col.name),
            self.column_type(&col.column_type)
        );
        if let Some(default) = &col.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        if !col.nullable {
            def.push_str(" NOT NULL");
        }
        if col.auto_increment {
            if let Some(kw) = self.auto_increment_keyword() {
                def.push(' ');
                def.push_str(kw);
            }
        }
        def
    }

    /// Quoted, comma-separated column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Apply a row window to a query.
    fn paginate(&self, sql: &str, page: &Page) -> String;

    /// Atomic insert-or-update keyed on `key_columns`. Bind names are the
    /// column names.
    fn build_upsert_query(
        &self,
        table: &str,
        key_columns: &[String],
        update_columns: &[String],
    ) -> String;

    /// Group statements for `execute_multiple_sql`.
    fn batch_statements(&self, statements: &[String], has_params: bool) -> BatchPlan;

    // ===== Table creation =====

    /// Whether CREATE TABLE declares the primary key itself.
    fn inline_primary_key(&self, table: &Table) -> bool;

    /// CREATE TABLE with the column definitions (and the inline primary key
    /// when [`inline_primary_key`](Self::inline_primary_key) holds).
    fn create_table_sql(&self, table: &Table) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        if table.has_pk() && self.inline_primary_key(table) {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(&table.primary_key)));
        }
        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_ident(&table.name),
            parts.join(",\n    ")
        )
    }

    /// Statements run after columns, primary key and indexes exist.
    fn post_create_table_sql(&self, _table: &Table) -> Vec<String> {
        Vec::new()
    }

    // ===== DDL =====

    fn drop_table_sql(&self, table: &str) -> String;

    fn rename_table_sql(&self, table: &str, new_name: &str) -> String;

    fn create_primary_key_sql(&self, table: &str, columns: &[String]) -> String;

    fn drop_primary_key_sql(&self, table: &str) -> String {
        format!("ALTER TABLE {} DROP PRIMARY KEY", self.quote_ident(table))
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> String;

    fn drop_index_sql(&self, table: &str, index: &str) -> String;

    fn rename_index_sql(&self, table: &str, index: &str, new_name: &str) -> String;

    fn create_foreign_key_sql(&self, fk: &ForeignKey) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_ident(&fk.table),
            self.quote_ident(&fk.name),
            self.column_list(&fk.columns),
            self.quote_ident(&fk.ref_table),
            self.column_list(&fk.ref_columns)
        );
        if fk.on_delete_cascade {
            sql.push_str(" ON DELETE CASCADE");
        }
        sql
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String;

    /// `None` when the dialect has no native sequences.
    fn create_sequence_sql(&self, seq: &Sequence) -> Option<String>;

    fn drop_sequence_sql(&self, name: &str) -> Option<String>;

    fn add_column_sql(&self, table: &str, col: &Column) -> String;

    /// Change a column to `col`. `current` is the definition read back from
    /// the catalog, if available.
    fn modify_column_sql(&self, table: &str, col: &Column, current: Option<&Column>) -> String;

    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_ident(table),
            self.quote_ident(column)
        )
    }

    fn rename_column_sql(&self, table: &str, column: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_ident(table),
            self.quote_ident(column),
            self.quote_ident(new_name)
        )
    }

    fn create_user_sql(&self, user: &str, password: &str) -> String;

    /// Privileges needed to own and use an application schema.
    fn grant_default_privileges_sql(&self, user: &str, database: &str) -> Vec<String>;

    fn drop_user_sql(&self, user: &str) -> String;

    // ===== Sequence emulation =====

    /// Sequence backing a table's auto-increment column, if emulated.
    fn table_sequence_name(&self, _table: &str) -> Option<String> {
        None
    }

    /// Sequence created with the table when auto-increment is emulated.
    /// It must exist before `post_create_table_sql` runs.
    fn auto_increment_sequence(&self, _table: &Table) -> Option<Sequence> {
        None
    }

    /// Query returning, in column `COLUMN_NAME`, the column filled by the
    /// emulated auto-increment of `table`.
    fn auto_increment_column_query(&self, _table: &str) -> Option<CatalogQuery> {
        None
    }

    /// Statements moving auto-increment emulation over to a table that was
    /// renamed from `table` to `new_name`.
    fn rename_auto_increment_sql(
        &self,
        _table: &str,
        _new_name: &str,
        _column: &str,
    ) -> Vec<String> {
        Vec::new()
    }

    /// Query returning the next value of a sequence in column `ID`.
    fn next_sequence_value_sql(&self, sequence: &str) -> Option<String>;

    /// Query returning the id generated by the last insert into `table`
    /// in column `ID`.
    fn last_insert_id_sql(&self, table: &str) -> String;

    // ===== Introspection =====
    //
    // Existence queries return a single `CNT` column.

    fn table_exists_query(&self, table: &str) -> CatalogQuery;

    fn column_exists_query(&self, table: &str, column: &str) -> CatalogQuery;

    fn index_exists_query(&self, table: &str, index: &str) -> CatalogQuery;

    fn constraint_exists_query(&self, table: &str, constraint: &str) -> CatalogQuery;

    fn sequence_exists_query(&self, sequence: &str) -> Option<CatalogQuery>;

    fn primary_key_exists_query(&self, table: &str) -> CatalogQuery;

    /// Catalog row(s) describing one column.
    fn column_info_query(&self, table: &str, column: &str) -> CatalogQuery;

    /// Reverse-map a catalog row to a logical column. `None` for native
    /// types without a logical counterpart.
    fn column_from_catalog(&self, row: &Row) -> Option<Column>;
}

/// A live native connection.
///
/// Implementations convert every driver error into `DbError::Execution`
/// and return fully materialized cursors.
pub trait Connection: Send {
    /// Execute one statement with named binds.
    ///
    /// `autocommit` is false while the engine has a transaction open.
    fn execute(&mut self, sql: &str, params: &BindParams, autocommit: bool) -> Result<Cursor>;

    /// Execute multi-statement text without binds.
    fn execute_batch(&mut self, sql: &str, autocommit: bool) -> Result<()> {
        self.execute(sql, &BindParams::new(), autocommit).map(|_| ())
    }

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Close the session. Errors are reported but the connection is gone
    /// either way.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections for an engine.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Target database (MySQL schema / Oracle service name).
    fn database(&self) -> &str;
}
