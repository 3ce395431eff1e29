//! Oracle SQL dialect (Strategy pattern).
//!
//! Identifiers are upper-cased before quoting, so `"ALIQUOTS"` and an
//! unquoted `aliquots` in hand-written SQL name the same object. Catalog
//! lookups bind upper-cased names for the same reason.
//!
//! Auto-increment columns are emulated with a `<TABLE>_SEQ` sequence and a
//! BEFORE INSERT trigger that fills the column when it is NULL.

use crate::core::cursor::Row;
use crate::core::identifier::quote_oracle;
use crate::core::params::BindParams;
use crate::core::schema::{Column, ColumnType, Index, Sequence, Table};
use crate::core::statement::classify;
use crate::core::traits::{BatchPlan, CatalogQuery, Dialect, Page};

/// Oracle dialect implementation. Requires 12c+ (OFFSET/FETCH).
#[derive(Debug, Clone, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Create a new Oracle dialect instance.
    pub fn new() -> Self {
        Self
    }

    fn trigger_name(table: &str) -> String {
        format!("{}_TRG", table.to_uppercase())
    }

    fn primary_key_name(table: &str) -> String {
        format!("PK_{}", table.to_uppercase())
    }

    fn upper(name: &str) -> String {
        name.to_uppercase()
    }

    fn sequence_name(table: &str) -> String {
        format!("{}_SEQ", table.to_uppercase())
    }

    /// Trigger filling `column` from the table's sequence when NULL.
    fn trigger_sql(&self, table: &str, column: &str) -> String {
        format!(
            "CREATE OR REPLACE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW \
             WHEN (NEW.{} IS NULL) BEGIN :NEW.{} := {}.NEXTVAL; END;",
            self.quote_ident(&Self::trigger_name(table)),
            self.quote_ident(table),
            self.quote_ident(column),
            self.quote_ident(column),
            self.quote_ident(&Self::sequence_name(table))
        )
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &str {
        "oracle"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_oracle(name)
    }

    fn column_type(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::BigInt => "NUMBER(38)".into(),
            ColumnType::Int => "NUMBER(10)".into(),
            ColumnType::TinyInt => "NUMBER(3)".into(),
            ColumnType::Decimal { length, scale } => format!("NUMBER({},{})", length, scale),
            ColumnType::Varchar(n) => format!("VARCHAR2({} CHAR)", n),
            ColumnType::Char(n) => format!("CHAR({} CHAR)", n),
            ColumnType::DateTime => "TIMESTAMP(0)".into(),
            ColumnType::Text => "VARCHAR2(4000 CHAR)".into(),
            ColumnType::LongText => "CLOB".into(),
            ColumnType::Blob => "BLOB".into(),
        }
    }

    fn paginate(&self, sql: &str, page: &Page) -> String {
        let skip = page.skip();
        match (page.limit, skip) {
            (None, 0) => sql.to_string(),
            (Some(limit), 0) => format!("{} FETCH FIRST {} ROWS ONLY", sql, limit),
            (Some(limit), skip) => format!(
                "{} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                sql, skip, limit
            ),
            (None, skip) => format!("{} OFFSET {} ROWS", sql, skip),
        }
    }

    fn build_upsert_query(
        &self,
        table: &str,
        key_columns: &[String],
        update_columns: &[String],
    ) -> String {
        let on = key_columns
            .iter()
            .map(|k| format!("t.{} = :{}", self.quote_ident(k), k))
            .collect::<Vec<_>>()
            .join(" AND ");

        // columns in the ON clause cannot be updated (ORA-38104)
        let updates: Vec<String> = update_columns
            .iter()
            .filter(|c| !key_columns.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .map(|c| format!("t.{} = :{}", self.quote_ident(c), c))
            .collect();

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

        let mut sql = format!(
            "MERGE INTO {} t USING DUAL ON ({})",
            self.quote_ident(table),
            on
        );
        if !updates.is_empty() {
            sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
            sql.push_str(&updates.join(", "));
        }
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            insert_cols, values
        ));
        sql
    }

    fn batch_statements(&self, statements: &[String], _has_params: bool) -> BatchPlan {
        let mut block = String::from("BEGIN\n");
        for stmt in statements {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            // PL/SQL bodies keep their terminating semicolon
            let body = if stmt.to_uppercase().ends_with("END;") {
                stmt
            } else {
                stmt.trim_end_matches(';').trim_end()
            };
            if classify(body).is_ddl() {
                block.push_str(&format!(
                    "  EXECUTE IMMEDIATE '{}';\n",
                    body.replace('\'', "''")
                ));
            } else {
                block.push_str(&format!("  {};\n", body.trim_end_matches(';')));
            }
        }
        block.push_str("END;");
        BatchPlan::Single(block)
    }

    fn inline_primary_key(&self, _table: &Table) -> bool {
        false
    }

    fn post_create_table_sql(&self, table: &Table) -> Vec<String> {
        match table.auto_increment_column() {
            Some(col) => vec![self.trigger_sql(&table.name, &col.name)],
            None => Vec::new(),
        }
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {} CASCADE CONSTRAINTS", self.quote_ident(table))
    }

    fn rename_table_sql(&self, table: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_ident(table),
            self.quote_ident(new_name)
        )
    }

    fn create_primary_key_sql(&self, table: &str, columns: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_ident(table),
            self.quote_ident(&Self::primary_key_name(table)),
            self.column_list(columns)
        )
    }

    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        let cols = index
            .columns
            .iter()
            .map(|c| match c.prefix_length {
                Some(len) => format!("SUBSTR({}, 1, {})", self.quote_ident(&c.name), len),
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

    fn drop_index_sql(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX {}", self.quote_ident(index))
    }

    fn rename_index_sql(&self, _table: &str, index: &str, new_name: &str) -> String {
        format!(
            "ALTER INDEX {} RENAME TO {}",
            self.quote_ident(index),
            self.quote_ident(new_name)
        )
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_ident(table),
            self.quote_ident(name)
        )
    }

    fn create_sequence_sql(&self, seq: &Sequence) -> Option<String> {
        let max = match seq.max_value {
            Some(max) => format!("MAXVALUE {}", max),
            None => "NOMAXVALUE".to_string(),
        };
        let cache = if seq.cache < 2 {
            "NOCACHE".to_string()
        } else {
            format!("CACHE {}", seq.cache)
        };
        Some(format!(
            "CREATE SEQUENCE {} MINVALUE {} {} START WITH {} INCREMENT BY {} {}",
            self.quote_ident(&seq.name),
            seq.min_value,
            max,
            seq.start,
            seq.increment,
            cache
        ))
    }

    fn drop_sequence_sql(&self, name: &str) -> Option<String> {
        Some(format!("DROP SEQUENCE {}", self.quote_ident(name)))
    }

    fn add_column_sql(&self, table: &str, col: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD ({})",
            self.quote_ident(table),
            self.column_definition(col)
        )
    }

    fn modify_column_sql(&self, table: &str, col: &Column, current: Option<&Column>) -> String {
        let mut def = format!(
            "{} {}",
            self.quote_ident(&col.name),
            self.column_type(&col.column_type)
        );
        if let Some(default) = &col.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        // restating the current nullability raises ORA-01442 / ORA-01451
        let nullability_changed = current.map_or(true, |cur| cur.nullable != col.nullable);
        if nullability_changed {
            def.push_str(if col.nullable { " NULL" } else { " NOT NULL" });
        }
        format!("ALTER TABLE {} MODIFY ({})", self.quote_ident(table), def)
    }

    fn create_user_sql(&self, user: &str, password: &str) -> String {
        format!(
            "CREATE USER {} IDENTIFIED BY \"{}\"",
            self.quote_ident(user),
            password
        )
    }

    fn grant_default_privileges_sql(&self, user: &str, _database: &str) -> Vec<String> {
        let user = self.quote_ident(user);
        vec![
            format!(
                "GRANT CREATE SESSION, CREATE TABLE, CREATE VIEW, CREATE SEQUENCE, \
                 CREATE TRIGGER, CREATE PROCEDURE TO {}",
                user
            ),
            format!("GRANT UNLIMITED TABLESPACE TO {}", user),
        ]
    }

    fn drop_user_sql(&self, user: &str) -> String {
        format!("DROP USER {} CASCADE", self.quote_ident(user))
    }

    fn table_sequence_name(&self, table: &str) -> Option<String> {
        Some(Self::sequence_name(table))
    }

    fn auto_increment_sequence(&self, table: &Table) -> Option<Sequence> {
        table.auto_increment_column()?;
        let mut seq = Sequence::new(Self::sequence_name(&table.name));
        seq.cache = 0;
        Some(seq)
    }

    fn auto_increment_column_query(&self, table: &str) -> Option<CatalogQuery> {
        // the trigger writes :NEW.<column>, which USER_TRIGGER_COLS reports
        // with usage NEW OUT
        Some(CatalogQuery::new(
            "SELECT COLUMN_NAME FROM USER_TRIGGER_COLS \
             WHERE TRIGGER_NAME = :trigger_name AND COLUMN_USAGE LIKE 'NEW%OUT'",
            BindParams::new().with("trigger_name", Self::trigger_name(table)),
        ))
    }

    fn rename_auto_increment_sql(&self, table: &str, new_name: &str, column: &str) -> Vec<String> {
        vec![
            format!(
                "DROP TRIGGER {}",
                self.quote_ident(&Self::trigger_name(table))
            ),
            format!(
                "RENAME {} TO {}",
                self.quote_ident(&Self::sequence_name(table)),
                self.quote_ident(&Self::sequence_name(new_name))
            ),
            self.trigger_sql(new_name, column),
        ]
    }

    fn next_sequence_value_sql(&self, sequence: &str) -> Option<String> {
        Some(format!(
            "SELECT {}.NEXTVAL AS ID FROM DUAL",
            self.quote_ident(sequence)
        ))
    }

    fn last_insert_id_sql(&self, table: &str) -> String {
        format!(
            "SELECT {}.CURRVAL AS ID FROM DUAL",
            self.quote_ident(&format!("{}_SEQ", table))
        )
    }

    fn table_exists_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COUNT(*) AS CNT FROM USER_TABLES WHERE TABLE_NAME = :table_name",
            BindParams::new().with("table_name", Self::upper(table)),
        )
    }

    fn column_exists_query(&self, table: &str, column: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COUNT(*) AS CNT FROM USER_TAB_COLUMNS \
             WHERE TABLE_NAME = :table_name AND COLUMN_NAME = :column_name",
            BindParams::new()
                .with("table_name", Self::upper(table))
                .with("column_name", Self::upper(column)),
        )
    }

    fn index_exists_query(&self, table: &str, index: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COUNT(*) AS CNT FROM USER_INDEXES \
             WHERE TABLE_NAME = :table_name AND INDEX_NAME = :index_name",
            BindParams::new()
                .with("table_name", Self::upper(table))
                .with("index_name", Self::upper(index)),
        )
    }

    fn constraint_exists_query(&self, table: &str, constraint: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COUNT(*) AS CNT FROM USER_CONSTRAINTS \
             WHERE TABLE_NAME = :table_name AND CONSTRAINT_NAME = :constraint_name",
            BindParams::new()
                .with("table_name", Self::upper(table))
                .with("constraint_name", Self::upper(constraint)),
        )
    }

    fn sequence_exists_query(&self, sequence: &str) -> Option<CatalogQuery> {
        Some(CatalogQuery::new(
            "SELECT COUNT(*) AS CNT FROM USER_SEQUENCES WHERE SEQUENCE_NAME = :sequence_name",
            BindParams::new().with("sequence_name", Self::upper(sequence)),
        ))
    }

    fn primary_key_exists_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COUNT(*) AS CNT FROM USER_CONSTRAINTS \
             WHERE TABLE_NAME = :table_name AND CONSTRAINT_TYPE = 'P'",
            BindParams::new().with("table_name", Self::upper(table)),
        )
    }

    fn column_info_query(&self, table: &str, column: &str) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT COLUMN_NAME, DATA_TYPE, CHAR_LENGTH, DATA_PRECISION, DATA_SCALE, \
             NULLABLE, DATA_DEFAULT FROM USER_TAB_COLUMNS \
             WHERE TABLE_NAME = :table_name AND COLUMN_NAME = :column_name",
            BindParams::new()
                .with("table_name", Self::upper(table))
                .with("column_name", Self::upper(column)),
        )
    }

    fn column_from_catalog(&self, row: &Row) -> Option<Column> {
        let name = row.get_string("COLUMN_NAME")?;
        let data_type = row.get_string("DATA_TYPE")?.to_uppercase();
        let length = || {
            row.get_i64("CHAR_LENGTH")
                .and_then(|n| u32::try_from(n).ok())
        };

        let column_type = match data_type.as_str() {
            "NUMBER" => {
                let precision = row.get_i64("DATA_PRECISION")?;
                let scale = row.get_i64("DATA_SCALE").unwrap_or(0);
                match (precision, scale) {
                    (38, 0) => ColumnType::BigInt,
                    (10, 0) => ColumnType::Int,
                    (3, 0) => ColumnType::TinyInt,
                    (p, s) => ColumnType::Decimal {
                        length: u32::try_from(p).ok()?,
                        scale: u32::try_from(s).ok()?,
                    },
                }
            }
            "VARCHAR2" | "NVARCHAR2" => ColumnType::Varchar(length()?),
            "CHAR" | "NCHAR" => ColumnType::Char(length()?),
            "DATE" => ColumnType::DateTime,
            t if t.starts_with("TIMESTAMP") && !t.contains("ZONE") => ColumnType::DateTime,
            "CLOB" | "NCLOB" => ColumnType::LongText,
            "BLOB" => ColumnType::Blob,
            _ => return None,
        };

        let nullable = row
            .get_string("NULLABLE")
            .map(|v| v.eq_ignore_ascii_case("Y"))
            .unwrap_or(true);
        let default = row
            .get_string("DATA_DEFAULT")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("NULL"));

        Some(Column {
            name,
            column_type,
            nullable,
            default,
            auto_increment: false,
        })
    }
}
