//! # crossdb
//!
//! Cross-dialect database engine for Oracle and MySQL/MariaDB.
//!
//! Application code declares a schema once, issues parameterized queries
//! and DDL once, and runs unmodified against either backend:
//!
//! - **Schema provisioning** from a declarative model, idempotent on rerun
//! - **Named binds** (`:name`) with LOB binding by naming convention
//! - **Upserts** rendered as MERGE or ON DUPLICATE KEY UPDATE
//! - **Pagination** with a 1-based offset on both dialects
//! - **Auto-increment** emulated with sequence + trigger on Oracle
//! - **Dump/restore** of table data in a line-JSON format
//!
//! ## Example
//!
//! ```rust,no_run
//! use crossdb::{BindParams, Column, ColumnType, Config, Engine, Schema, Table};
//!
//! fn main() -> crossdb::Result<()> {
//!     let config = Config::load("crossdb.yaml")?;
//!     let mut engine = Engine::from_config(&config)?;
//!     engine.connect()?;
//!
//!     let schema = Schema::new("trials").table(
//!         Table::new(
//!             "patients",
//!             vec![
//!                 Column::new("id", ColumnType::BigInt).auto_increment(),
//!                 Column::new("name", ColumnType::Varchar(64)).not_null(),
//!             ],
//!         )
//!         .primary_key(["id"]),
//!     );
//!     engine.create_schema(&schema, false)?;
//!
//!     let params = BindParams::new().with("name", "Ada");
//!     engine.execute_bind_query("INSERT INTO patients (name) VALUES (:name)", &params)?;
//!     println!("new id: {}", engine.last_insert_id("patients")?);
//!     engine.disconnect()
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, ConnectionUri, DbType, EngineConfig};
pub use self::core::{
    bind_param_array, BindParams, Column, ColumnType, Cursor, ForeignKey, Index, IndexColumn, Page,
    Row, Schema, Sequence, SqlValue, Table,
};
pub use drivers::{DialectImpl, MysqlDialect, OracleDialect};
pub use engine::{Engine, EngineOptions, QueryLogEntry, QueryLogger, TracingLogger};
pub use error::{DbError, ErrorDescriptor, Result};
pub use transfer::{dump_table, populate_table, TransferStats, COMMIT_EVERY};
