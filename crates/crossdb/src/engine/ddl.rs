//! Schema provisioning and DDL operations.
//!
//! The dialect renders each statement; the engine decides order, skips
//! objects that already exist and cleans up after a half-built table.

use std::panic::Location;

use tracing::{debug, info, warn};

use crate::core::identifier::validate_identifier;
use crate::core::params::BindParams;
use crate::core::schema::{Column, ForeignKey, Index, Schema, Sequence, Table};
use crate::core::traits::Dialect;
use crate::error::{DbError, Result};

use super::Engine;

type Caller = &'static Location<'static>;

fn already_exists(kind: &str, name: &str) -> DbError {
    DbError::execution("OBJECT_EXISTS", format!("{} {} already exists", kind, name))
}

impl<D: Dialect> Engine<D> {
    fn ddl(&mut self, sql: &str, caller: Caller) -> Result<()> {
        self.run(sql, &BindParams::new(), None, true, caller)?;
        Ok(())
    }

    fn ddl_all(&mut self, statements: Vec<String>, caller: Caller) -> Result<()> {
        for sql in statements {
            self.ddl(&sql, caller)?;
        }
        Ok(())
    }

    // ===== Schema =====

    /// Provision a whole schema: sequences, then tables in declaration
    /// order, then foreign keys.
    ///
    /// With `fail_if_exists == false` existing objects are skipped, so the
    /// call can be repeated safely. With `true` an existing table or
    /// sequence is an error.
    #[track_caller]
    pub fn create_schema(&mut self, schema: &Schema, fail_if_exists: bool) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| engine.create_schema_at(schema, fail_if_exists, caller))
    }

    fn create_schema_at(
        &mut self,
        schema: &Schema,
        fail_if_exists: bool,
        caller: Caller,
    ) -> Result<()> {
        info!(
            "Creating schema {}: {} tables, {} foreign keys, {} sequences",
            schema.name,
            schema.tables.len(),
            schema.foreign_keys.len(),
            schema.sequences.len()
        );

        for seq in &schema.sequences {
            let Some(sql) = self.dialect.create_sequence_sql(seq) else {
                debug!("Skipping sequence {}: not supported by {}", seq.name, self.dialect.name());
                continue;
            };
            if self.sequence_exists_inner(&seq.name)? {
                if fail_if_exists {
                    return Err(already_exists("Sequence", &seq.name));
                }
                debug!("Sequence {} exists, skipping", seq.name);
                continue;
            }
            debug!("Creating sequence: {}", seq.name);
            self.ddl(&sql, caller)?;
        }

        let mut created = 0;
        for table in &schema.tables {
            if self.table_exists_inner(&table.name)? {
                if fail_if_exists {
                    return Err(already_exists("Table", &table.name));
                }
                debug!("Table {} exists, skipping", table.name);
                continue;
            }
            self.create_table_at(table, caller)?;
            created += 1;
        }

        for fk in &schema.foreign_keys {
            if self.constraint_exists_inner(&fk.table, &fk.name)? {
                debug!("Foreign key {} exists, skipping", fk.name);
                continue;
            }
            debug!("Creating FK: {}.{}", fk.table, fk.name);
            let sql = self.dialect.create_foreign_key_sql(fk);
            self.ddl(&sql, caller)?;
        }

        info!(
            "Schema {} ready ({} of {} tables created)",
            schema.name,
            created,
            schema.tables.len()
        );
        Ok(())
    }

    // ===== Tables =====

    /// Create a table with its primary key, indexes and the dialect's
    /// post-create objects. If any step after the CREATE TABLE fails, the
    /// table is dropped again before the error is returned, together with
    /// an auto-increment sequence this call created. A sequence that
    /// already existed is reused and left alone.
    #[track_caller]
    pub fn create_table(&mut self, table: &Table) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| engine.create_table_at(table, caller))
    }

    fn create_table_at(&mut self, table: &Table, caller: Caller) -> Result<()> {
        validate_identifier(&table.name)?;
        for col in &table.columns {
            validate_identifier(&col.name)?;
        }

        debug!("Creating table: {}", table.name);
        let sql = self.dialect.create_table_sql(table);
        self.ddl(&sql, caller)?;

        let mut created_sequence = None;
        if let Err(e) = self.complete_table(table, &mut created_sequence, caller) {
            warn!(
                "Failed to complete table {}, dropping it: {}",
                table.name, e
            );
            self.undo_table(&table.name, created_sequence.as_deref(), caller);
            return Err(e);
        }
        Ok(())
    }

    fn complete_table(
        &mut self,
        table: &Table,
        created_sequence: &mut Option<String>,
        caller: Caller,
    ) -> Result<()> {
        let mut followups = Vec::new();
        if table.has_pk() && !self.dialect.inline_primary_key(table) {
            followups.push(
                self.dialect
                    .create_primary_key_sql(&table.name, &table.primary_key),
            );
        }
        for index in &table.indexes {
            followups.push(self.dialect.create_index_sql(&table.name, index));
        }
        self.ddl_all(followups, caller)?;

        if let Some(seq) = self.dialect.auto_increment_sequence(table) {
            if self.sequence_exists_inner(&seq.name)? {
                debug!("Sequence {} exists, reusing it for {}", seq.name, table.name);
            } else if let Some(sql) = self.dialect.create_sequence_sql(&seq) {
                self.ddl(&sql, caller)?;
                *created_sequence = Some(seq.name);
            }
        }

        let post = self.dialect.post_create_table_sql(table);
        self.ddl_all(post, caller)
    }

    /// Drop what a failed `create_table` built. Errors are only logged so
    /// the original failure reaches the caller.
    fn undo_table(&mut self, table: &str, created_sequence: Option<&str>, caller: Caller) {
        let sql = self.dialect.drop_table_sql(table);
        if let Err(e) = self.ddl(&sql, caller) {
            warn!("Failed to drop table {}: {}", table, e);
        }
        let Some(seq) = created_sequence else {
            return;
        };
        if let Some(sql) = self.dialect.drop_sequence_sql(seq) {
            if let Err(e) = self.ddl(&sql, caller) {
                warn!("Failed to drop sequence {}: {}", seq, e);
            }
        }
    }

    /// Drop a table, and its auto-increment sequence where the dialect
    /// emulates one. Does nothing when the table does not exist.
    #[track_caller]
    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| engine.drop_table_at(table, caller))
    }

    fn drop_table_at(&mut self, table: &str, caller: Caller) -> Result<()> {
        if self.table_exists_inner(table)? {
            debug!("Dropping table: {}", table);
            let sql = self.dialect.drop_table_sql(table);
            self.ddl(&sql, caller)?;
        }
        if let Some(seq) = self.dialect.table_sequence_name(table) {
            if self.sequence_exists_inner(&seq)? {
                if let Some(sql) = self.dialect.drop_sequence_sql(&seq) {
                    self.ddl(&sql, caller)?;
                }
            }
        }
        Ok(())
    }

    /// Rename a table. An emulated auto-increment moves with it: its
    /// sequence and trigger take the new table's names, so the old name is
    /// free to be created again.
    #[track_caller]
    pub fn rename_table(&mut self, table: &str, new_name: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(new_name)?;
            let column = engine.auto_increment_column_inner(table)?;
            let sql = engine.dialect.rename_table_sql(table, new_name);
            engine.ddl(&sql, caller)?;
            if let Some(column) = column {
                debug!("Moving auto-increment of {} to {}", table, new_name);
                let moves = engine
                    .dialect
                    .rename_auto_increment_sql(table, new_name, &column);
                engine.ddl_all(moves, caller)?;
            }
            Ok(())
        })
    }

    // ===== Keys and indexes =====

    #[track_caller]
    pub fn create_primary_key<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> Result<()> {
        let caller = Location::caller();
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.tracked(|engine| {
            let sql = engine.dialect.create_primary_key_sql(table, &columns);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn drop_primary_key(&mut self, table: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.drop_primary_key_sql(table);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn create_index(&mut self, table: &str, index: &Index) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(&index.name)?;
            let sql = engine.dialect.create_index_sql(table, index);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn drop_index(&mut self, table: &str, index: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.drop_index_sql(table, index);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn rename_index(&mut self, table: &str, index: &str, new_name: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(new_name)?;
            let sql = engine.dialect.rename_index_sql(table, index, new_name);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn create_foreign_key(&mut self, fk: &ForeignKey) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(&fk.name)?;
            let sql = engine.dialect.create_foreign_key_sql(fk);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn drop_foreign_key(&mut self, table: &str, name: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.drop_foreign_key_sql(table, name);
            engine.ddl(&sql, caller)
        })
    }

    // ===== Sequences =====

    /// Create a standalone sequence. Dialects without native sequences
    /// return `NOT_IMPLEMENTED`.
    #[track_caller]
    pub fn create_sequence(&mut self, seq: &Sequence) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(&seq.name)?;
            let sql = engine.dialect.create_sequence_sql(seq).ok_or_else(|| {
                DbError::NotImplemented(format!("sequences on {}", engine.dialect.name()))
            })?;
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn drop_sequence(&mut self, name: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.drop_sequence_sql(name).ok_or_else(|| {
                DbError::NotImplemented(format!("sequences on {}", engine.dialect.name()))
            })?;
            engine.ddl(&sql, caller)
        })
    }

    // ===== Columns =====

    /// Add a column to an existing table.
    #[track_caller]
    pub fn create_column(&mut self, table: &str, col: &Column) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(&col.name)?;
            let sql = engine.dialect.add_column_sql(table, col);
            engine.ddl(&sql, caller)
        })
    }

    /// Change a column's type, default or nullability.
    ///
    /// The current definition is read first so only actual nullability
    /// changes are emitted.
    #[track_caller]
    pub fn modify_column(&mut self, table: &str, col: &Column) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let current = engine.column_info_inner(table, &col.name)?;
            let sql = engine
                .dialect
                .modify_column_sql(table, col, current.as_ref());
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.drop_column_sql(table, column);
            engine.ddl(&sql, caller)
        })
    }

    #[track_caller]
    pub fn rename_column(&mut self, table: &str, column: &str, new_name: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(new_name)?;
            let sql = engine.dialect.rename_column_sql(table, column, new_name);
            engine.ddl(&sql, caller)
        })
    }

    // ===== Users =====

    #[track_caller]
    pub fn create_user(&mut self, user: &str, password: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            validate_identifier(user)?;
            if password.is_empty() {
                return Err(DbError::Config("User password cannot be empty".into()));
            }
            // Oracle passwords are quoted identifiers, which cannot be escaped
            if engine.dialect.name() == "oracle" && password.contains('"') {
                return Err(DbError::Config(
                    "Oracle passwords cannot contain '\"'".into(),
                ));
            }
            info!("Creating user: {}", user);
            let sql = engine.dialect.create_user_sql(user, password);
            engine.ddl(&sql, caller)
        })
    }

    /// Grant the privileges an application schema owner needs on the
    /// connected database.
    #[track_caller]
    pub fn grant_default_privileges(&mut self, user: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let database = engine.database().to_string();
            let statements = engine.dialect.grant_default_privileges_sql(user, &database);
            engine.ddl_all(statements, caller)
        })
    }

    #[track_caller]
    pub fn drop_user(&mut self, user: &str) -> Result<()> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.drop_user_sql(user);
            engine.ddl(&sql, caller)
        })
    }
}
