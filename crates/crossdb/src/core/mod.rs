//! Core abstractions shared by the engine and both backends.
//!
//! - [`schema`]: table, column, index, foreign key and sequence blueprints
//! - [`value`]: SQL value representation
//! - [`params`]: named bind parameters and placeholder scanning
//! - [`cursor`]: materialized result sets
//! - [`statement`]: statement classification
//! - [`traits`]: `Dialect`, `Connection` and `Connector`

pub mod cursor;
pub mod identifier;
pub mod params;
pub mod schema;
pub mod statement;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use cursor::{Cursor, Row};
pub use params::{bind_param_array, BindParams};
pub use schema::{Column, ColumnType, ForeignKey, Index, IndexColumn, Schema, Sequence, Table};
pub use statement::StatementKind;
pub use traits::{BatchPlan, CatalogQuery, Connection, Connector, Dialect, Page};
pub use value::SqlValue;
