//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific SQL syntax for identifier quoting, type mapping,
//! DDL, pagination, upserts and catalog lookups.

use crate::core::cursor::Row;
use crate::core::identifier::{quote_mysql, quote_mysql_literal};
use crate::core::params::BindParams;
use crate::core::schema::{Column, ColumnType, Index, Sequence, Table};
use crate::core::traits::{BatchPlan, CatalogQuery, Dialect, Page};

/// Row count MySQL accepts as "no limit" when only an offset is given.
const MAX_LIMIT: &str = "18446744073709551615";

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 8.0+ and MariaDB 10.5+ (RENAME COLUMN).
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn account(user: &str) -> String {
        format!("{}@'%'", quote_mysql_literal(user))
    }

    fn exists_query(sql: &str, params: BindParams) -> CatalogQuery {
        CatalogQuery::new(sql, params)
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_mysql(name)
    }

    fn column_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::BigInt => "BIGINT".into(),
            ColumnType::Int => "INT".into(),
            ColumnType::TinyInt => "TINYINT".into(),
            ColumnType::Decimal { length, scale } => format!("DECIMAL({},{})", length, scale),
            ColumnType::Varchar(n) => format!("VARCHAR({})", n),
            ColumnType::Char(n) => format!("CHAR({})", n),
            ColumnType::DateTime => "DATETIME".into(),
            ColumnType::Text => "TEXT".into(),
            ColumnType::LongText => "LONGTEXT".into(),
            ColumnType::Blob => "LONGBLOB".into(),
        }
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn paginate(&self, sql: &str, page: &Page) -> String {
        let skip = page.skip();
        match (page.limit, skip) {
            (None, 0) => sql.to_string(),
            (Some(limit), 0) => format!("{} LIMIT {}", sql, limit),
            (Some(limit), skip) => format!("{} LIMIT {} OFFSET {}", sql, limit, skip),
            (None, skip) => format!("{} LIMIT {} OFFSET {}", sql, MAX_LIMIT, skip),
        }
    }

    fn build_upsert_query(
        &self,
        table: &str,
        key_columns: &[String],
        update_columns: &[String],
    ) -> String {
        let mut columns: Vec<&String> = key_columns.iter().collect();
        for col in update_columns {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(col)) {
                columns.push(col);
            }
        }

        let insert_cols = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let values = columns
            .iter()
            .map(|c| format!(":{}", c))
            .collect::<Vec<_>>()
            .join(", ");

        let updates: Vec<String> = update_columns
            .iter()
            .filter(|c| !key_columns.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .map(|c| format!("{} = VALUES({})", self.quote_ident(c), self.quote_ident(c)))
            .collect();

        // an empty UPDATE list is a syntax error; assign the key to itself
        let update_set = if updates.is_empty() {
            match key_columns.first() {
                Some(k) => format!("{} = {}", self.quote_ident(k), self.quote_ident(k)),
                None => String::new(),
            }
        } else {
            updates.join(", ")
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            self.quote_ident(table),
            insert_cols,
            values,
            update_set
        )
    }

    fn batch_statements(&self, statements: &[String], has_params: bool) -> BatchPlan {
        let trimmed: Vec<String> = statements
            .iter()
            .map(|s| s.trim().trim_end_matches(';').trim_end().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if has_params {
            BatchPlan::Sequential(trimmed)
        } else {
            BatchPlan::Script(trimmed.join(";\n"))
        }
    }

    fn inline_primary_key(&self, table: &Table) -> bool {
        // AUTO_INCREMENT columns must be a key at CREATE time
        table.is_auto_increment()
    }

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
            "CREATE TABLE {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.quote_ident(&table.name),
            parts.join(",\n    ")
        )
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_ident(table))
    }

    fn rename_table_sql(&self, table: &str, new_name: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.quote_ident(table),
            self.quote_ident(new_name)
        )
    }

    fn create_primary_key_sql(&self, table: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.quote_ident(table),
            self.column_list(columns)
        )
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        let cols = index
            .columns
            .iter()
            .map(|c| match c.prefix_length {
                Some(len) => format!("{}({})", self.quote_ident(&c.name), len),
                None => self.quote_ident(&c.name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_ident(&index.name),
            self.quote_ident(table),
            cols
        )
    }

    fn drop_index_sql(&self, table: &str, index: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_ident(index),
            self.quote_ident(table)
        )
    }

    fn rename_index_sql(&self, table: &str, index: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            self.quote_ident(table),
            self.quote_ident(index),
            self.quote_ident(new_name)
        )
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_ident(table),
            self.quote_ident(name)
        )
    }

    fn create_sequence_sql(&self, _seq: &Sequence) -> Option<String> {
        None
    }

    fn drop_sequence_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn add_column_sql(&self, table: &str, col: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_ident(table),
            self.column_definition(col)
        )
    }

    fn modify_column_sql(&self, table: &str, col: &Column, _current: Option<&Column>) -> String {
        // MODIFY restates the whole definition; omitted NOT NULL means NULL
        format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_ident(table),
            self.column_definition(col)
        )
    }

    fn create_user_sql(&self, user: &str, password: &str) -> String {
        format!(
            "CREATE USER {} IDENTIFIED BY {}",
            Self::account(user),
            quote_mysql_literal(password)
        )
    }

    fn grant_default_privileges_sql(&self, user: &str, database: &str) -> Vec<String> {
        vec![format!(
            "GRANT SELECT, INSERT, UPDATE, DELETE, CREATE, ALTER, DROP, INDEX, REFERENCES, \
             CREATE VIEW, LOCK TABLES ON {}.* TO {}",
            self.quote_ident(database),
            Self::account(user)
        )]
    }

    fn drop_user_sql(&self, user: &str) -> String {
        format!("DROP USER {}", Self::account(user))
    }

    fn next_sequence_value_sql(&self, _sequence: &str) -> Option<String> {
        None
    }

    fn last_insert_id_sql(&self, _table: &str) -> String {
        "SELECT LAST_INSERT_ID() AS ID".to_string()
    }

    fn table_exists_query(&self, table: &str) -> CatalogQuery {
        Self::exists_query(
            "SELECT COUNT(*) AS CNT FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = :table_name",
            BindParams::new().with("table_name", table),
        )
    }

    fn column_exists_query(&self, table: &str, column: &str) -> CatalogQuery {
        Self::exists_query(
            "SELECT COUNT(*) AS CNT FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = :table_name \
             AND COLUMN_NAME = :column_name",
            BindParams::new()
                .with("table_name", table)
                .with("column_name", column),
        )
    }

    fn index_exists_query(&self, table: &str, index: &str) -> CatalogQuery {
        Self::exists_query(
            "SELECT COUNT(DISTINCT INDEX_NAME) AS CNT FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = :table_name \
             AND INDEX_NAME = :index_name",
            BindParams::new()
                .with("table_name", table)
                .with("index_name", index),
        )
    }

    fn constraint_exists_query(&self, table: &str, constraint: &str) -> CatalogQuery {
        Self::exists_query(
            "SELECT COUNT(*) AS CNT FROM information_schema.TABLE_CONSTRAINTS \
             WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = :table_name \
             AND CONSTRAINT_NAME = :constraint_name",
            BindParams::new()
                .with("table_name", table)
                .with("constraint_name", constraint),
        )
    }

    fn sequence_exists_query(&self, _sequence: &str) -> Option<CatalogQuery> {
        None
    }

    fn primary_key_exists_query(&self, table: &str) -> CatalogQuery {
        Self::exists_query(
            "SELECT COUNT(*) AS CNT FROM information_schema.TABLE_CONSTRAINTS \
             WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = :table_name \
             AND CONSTRAINT_TYPE = 'PRIMARY KEY'",
            BindParams::new().with("table_name", table),
        )
    }

    fn column_info_query(&self, table: &str, column: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COLUMN_NAME AS COLUMN_NAME, DATA_TYPE AS DATA_TYPE, \
             CHARACTER_MAXIMUM_LENGTH AS CHAR_LENGTH, NUMERIC_PRECISION AS DATA_PRECISION, \
             NUMERIC_SCALE AS DATA_SCALE, IS_NULLABLE AS NULLABLE, \
             COLUMN_DEFAULT AS DATA_DEFAULT, EXTRA AS EXTRA \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = :table_name \
             AND COLUMN_NAME = :column_name",
            BindParams::new()
                .with("table_name", table)
                .with("column_name", column),
        )
    }

    fn column_from_catalog(&self, row: &Row) -> Option<Column> {
        let name = row.get_string("COLUMN_NAME")?;
        let data_type = row.get_string("DATA_TYPE")?.to_lowercase();
        let length = || {
            row.get_i64("CHAR_LENGTH")
                .and_then(|n| u32::try_from(n).ok())
        };

        let column_type = match data_type.as_str() {
            "bigint" => ColumnType::BigInt,
            "int" | "integer" => ColumnType::Int,
            "tinyint" => ColumnType::TinyInt,
            "decimal" | "numeric" => ColumnType::Decimal {
                length: u32::try_from(row.get_i64("DATA_PRECISION")?).ok()?,
                scale: u32::try_from(row.get_i64("DATA_SCALE").unwrap_or(0)).ok()?,
            },
            "varchar" => ColumnType::Varchar(length()?),
            "char" => ColumnType::Char(length()?),
            "datetime" | "timestamp" => ColumnType::DateTime,
            "text" => ColumnType::Text,
            "longtext" | "mediumtext" => ColumnType::LongText,
            "blob" | "mediumblob" | "longblob" => ColumnType::Blob,
            _ => return None,
        };

        let nullable = row
            .get_string("NULLABLE")
            .map(|v| v.eq_ignore_ascii_case("YES"))
            .unwrap_or(true);
        let default = row
            .get_string("DATA_DEFAULT")
            .filter(|d| !d.eq_ignore_ascii_case("NULL"));
        let auto_increment = row
            .get_string("EXTRA")
            .map(|e| e.to_lowercase().contains("auto_increment"))
            .unwrap_or(false);

        Some(Column {
            name,
            column_type,
            nullable,
            default,
            auto_increment,
        })
    }
}
