//! Database driver implementations.
//!
//! - [`oracle`]: Oracle (12c+) dialect and connection
//! - [`mysql`]: MySQL/MariaDB dialect and connection
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax strategy for the database engine
//! - `Connector` / `Connection`: native sessions (behind the driver's
//!   feature flag)
//!
//! The backend is chosen from the connection URI scheme with
//! [`DialectImpl::from_db_type`] and [`connector_for`].
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Dialect`, `Connector` and `Connection`
//! 3. Add an enum variant to `DialectImpl` and a `DbType`
//! 4. Gate the connection with a feature flag in `Cargo.toml`

pub mod mysql;
pub mod oracle;

pub use mysql::MysqlDialect;
pub use oracle::OracleDialect;

use crate::config::{ConnectionUri, DbType};
use crate::core::cursor::Row;
use crate::core::schema::{Column, ColumnType, ForeignKey, Index, Sequence, Table};
use crate::core::traits::{BatchPlan, CatalogQuery, Connector, Dialect, Page};
use crate::error::{DbError, Result};

/// Enum-based static dispatch for dialects.
///
/// The compiler generates a match statement instead of using vtable
/// dispatch.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Oracle(OracleDialect),
    Mysql(MysqlDialect),
}

impl DialectImpl {
    /// Create a dialect implementation from a database type string
    /// (`oci`, `oracle`, `mysql`, `mariadb`).
    ///
    /// # Errors
    ///
    /// Returns an error if the database type is not recognized.
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        Ok(Self::for_type(db_type.parse()?))
    }

    pub fn for_type(db_type: DbType) -> Self {
        match db_type {
            DbType::Oracle => DialectImpl::Oracle(OracleDialect::new()),
            DbType::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
        }
    }
}

/// Connector for the backend named by the URI scheme.
///
/// # Errors
///
/// Returns a configuration error when the backend was compiled out.
pub fn connector_for(uri: &ConnectionUri) -> Result<Box<dyn Connector>> {
    match uri.db_type {
        #[cfg(feature = "oracle")]
        DbType::Oracle => Ok(Box::new(oracle::OracleConnector::new(uri.clone()))),
        #[cfg(feature = "mysql")]
        DbType::Mysql => Ok(Box::new(mysql::MysqlConnector::new(uri.clone()))),
        #[allow(unreachable_patterns)]
        other => Err(DbError::Config(format!(
            "Support for '{}' was not compiled in (enable the '{}' feature)",
            other, other
        ))),
    }
}

macro_rules! dispatch {
    ($self:ident, $d:ident => $call:expr) => {
        match $self {
            DialectImpl::Oracle($d) => $call,
            DialectImpl::Mysql($d) => $call,
        }
    };
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        dispatch!(self, d => d.name())
    }

    fn quote_ident(&self, name: &str) -> String {
        dispatch!(self, d => d.quote_ident(name))
    }

    fn column_type(&self, ty: &ColumnType) -> String {
        dispatch!(self, d => d.column_type(ty))
    }

    fn backslash_escapes(&self) -> bool {
        dispatch!(self, d => d.backslash_escapes())
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        dispatch!(self, d => d.auto_increment_keyword())
    }

    fn column_definition(&self, col: &Column) -> String {
        dispatch!(self, d => d.column_definition(col))
    }

    fn column_list(&self, columns: &[String]) -> String {
        dispatch!(self, d => d.column_list(columns))
    }

    fn paginate(&self, sql: &str, page: &Page) -> String {
        dispatch!(self, d => d.paginate(sql, page))
    }

    fn build_upsert_query(
        &self,
        table: &str,
        key_columns: &[String],
        update_columns: &[String],
    ) -> String {
        dispatch!(self, d => d.build_upsert_query(table, key_columns, update_columns))
    }

    fn batch_statements(&self, statements: &[String], has_params: bool) -> BatchPlan {
        dispatch!(self, d => d.batch_statements(statements, has_params))
    }

    fn inline_primary_key(&self, table: &Table) -> bool {
        dispatch!(self, d => d.inline_primary_key(table))
    }

    fn create_table_sql(&self, table: &Table) -> String {
        dispatch!(self, d => d.create_table_sql(table))
    }

    fn post_create_table_sql(&self, table: &Table) -> Vec<String> {
        dispatch!(self, d => d.post_create_table_sql(table))
    }

    fn drop_table_sql(&self, table: &str) -> String {
        dispatch!(self, d => d.drop_table_sql(table))
    }

    fn rename_table_sql(&self, table: &str, new_name: &str) -> String {
        dispatch!(self, d => d.rename_table_sql(table, new_name))
    }

    fn create_primary_key_sql(&self, table: &str, columns: &[String]) -> String {
        dispatch!(self, d => d.create_primary_key_sql(table, columns))
    }

    fn drop_primary_key_sql(&self, table: &str) -> String {
        dispatch!(self, d => d.drop_primary_key_sql(table))
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        dispatch!(self, d => d.create_index_sql(table, index))
    }

    fn drop_index_sql(&self, table: &str, index: &str) -> String {
        dispatch!(self, d => d.drop_index_sql(table, index))
    }

    fn rename_index_sql(&self, table: &str, index: &str, new_name: &str) -> String {
        dispatch!(self, d => d.rename_index_sql(table, index, new_name))
    }

    fn create_foreign_key_sql(&self, fk: &ForeignKey) -> String {
        dispatch!(self, d => d.create_foreign_key_sql(fk))
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        dispatch!(self, d => d.drop_foreign_key_sql(table, name))
    }

    fn create_sequence_sql(&self, seq: &Sequence) -> Option<String> {
        dispatch!(self, d => d.create_sequence_sql(seq))
    }

    fn drop_sequence_sql(&self, name: &str) -> Option<String> {
        dispatch!(self, d => d.drop_sequence_sql(name))
    }

    fn add_column_sql(&self, table: &str, col: &Column) -> String {
        dispatch!(self, d => d.add_column_sql(table, col))
    }

    fn modify_column_sql(&self, table: &str, col: &Column, current: Option<&Column>) -> String {
        dispatch!(self, d => d.modify_column_sql(table, col, current))
    }

    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        dispatch!(self, d => d.drop_column_sql(table, column))
    }

    fn rename_column_sql(&self, table: &str, column: &str, new_name: &str) -> String {
        dispatch!(self, d => d.rename_column_sql(table, column, new_name))
    }

    fn create_user_sql(&self, user: &str, password: &str) -> String {
        dispatch!(self, d => d.create_user_sql(user, password))
    }

    fn grant_default_privileges_sql(&self, user: &str, database: &str) -> Vec<String> {
        dispatch!(self, d => d.grant_default_privileges_sql(user, database))
    }

    fn drop_user_sql(&self, user: &str) -> String {
        dispatch!(self, d => d.drop_user_sql(user))
    }

    fn table_sequence_name(&self, table: &str) -> Option<String> {
        dispatch!(self, d => d.table_sequence_name(table))
    }

    fn auto_increment_sequence(&self, table: &Table) -> Option<Sequence> {
        dispatch!(self, d => d.auto_increment_sequence(table))
    }

    fn auto_increment_column_query(&self, table: &str) -> Option<CatalogQuery> {
        dispatch!(self, d => d.auto_increment_column_query(table))
    }

    fn rename_auto_increment_sql(&self, table: &str, new_name: &str, column: &str) -> Vec<String> {
        dispatch!(self, d => d.rename_auto_increment_sql(table, new_name, column))
    }

    fn next_sequence_value_sql(&self, sequence: &str) -> Option<String> {
        dispatch!(self, d => d.next_sequence_value_sql(sequence))
    }

    fn last_insert_id_sql(&self, table: &str) -> String {
        dispatch!(self, d => d.last_insert_id_sql(table))
    }

    fn table_exists_query(&self, table: &str) -> CatalogQuery {
        dispatch!(self, d => d.table_exists_query(table))
    }

    fn column_exists_query(&self, table: &str, column: &str) -> CatalogQuery {
        dispatch!(self, d => d.column_exists_query(table, column))
    }

    fn index_exists_query(&self, table: &str, index: &str) -> CatalogQuery {
        dispatch!(self, d => d.index_exists_query(table, index))
    }

    fn constraint_exists_query(&self, table: &str, constraint: &str) -> CatalogQuery {
        dispatch!(self, d => d.constraint_exists_query(table, constraint))
    }

    fn sequence_exists_query(&self, sequence: &str) -> Option<CatalogQuery> {
        dispatch!(self, d => d.sequence_exists_query(sequence))
    }

    fn primary_key_exists_query(&self, table: &str) -> CatalogQuery {
        dispatch!(self, d => d.primary_key_exists_query(table))
    }

    fn column_info_query(&self, table: &str, column: &str) -> CatalogQuery {
        dispatch!(self, d => d.column_info_query(table, column))
    }

    fn column_from_catalog(&self, row: &Row) -> Option<Column> {
        dispatch!(self, d => d.column_from_catalog(row))
    }
}
