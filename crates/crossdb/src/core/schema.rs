//! Schema definition model: columns, tables, indexes, foreign keys,
//! sequences and schemas.
//!
//! These are dialect-agnostic blueprints. They are built in memory (or
//! loaded from YAML), handed to `Engine::create_schema` / `create_table`,
//! and rendered to native DDL by the active dialect.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// Logical column type. Closed set shared by every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    BigInt,
    Int,
    TinyInt,
    Decimal { length: u32, scale: u32 },
    Varchar(u32),
    Char(u32),
    DateTime,
    Text,
    LongText,
    Blob,
}

impl ColumnType {
    /// True for types bound through the LOB path on dialects that need it.
    pub fn is_lob(&self) -> bool {
        matches!(self, ColumnType::LongText | ColumnType::Blob)
    }

    /// True for types holding character data.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ColumnType::Varchar(_) | ColumnType::Char(_) | ColumnType::Text | ColumnType::LongText
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Int => write!(f, "INT"),
            ColumnType::TinyInt => write!(f, "TINYINT"),
            ColumnType::Decimal { length, scale } => write!(f, "DECIMAL({},{})", length, scale),
            ColumnType::Varchar(n) => write!(f, "VARCHAR({})", n),
            ColumnType::Char(n) => write!(f, "CHAR({})", n),
            ColumnType::DateTime => write!(f, "DATETIME"),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::LongText => write!(f, "LONGTEXT"),
            ColumnType::Blob => write!(f, "BLOB"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace(' ', "");
        let (base, args) = match normalized.find('(') {
            Some(open) if normalized.ends_with(')') => (
                &normalized[..open],
                Some(&normalized[open + 1..normalized.len() - 1]),
            ),
            _ => (normalized.as_str(), None),
        };

        let parse_num = |v: &str| {
            v.parse::<u32>()
                .map_err(|_| DbError::Config(format!("Invalid length in column type '{}'", s)))
        };

        let ty = match (base, args) {
            ("BIGINT", None) => ColumnType::BigInt,
            ("INT" | "INTEGER", None) => ColumnType::Int,
            ("TINYINT", None) => ColumnType::TinyInt,
            ("DECIMAL", Some(args)) => {
                let mut parts = args.split(',');
                let length = parse_num(parts.next().unwrap_or_default())?;
                let scale = match parts.next() {
                    Some(scale) => parse_num(scale)?,
                    None => 0,
                };
                ColumnType::Decimal { length, scale }
            }
            ("VARCHAR", Some(n)) => ColumnType::Varchar(parse_num(n)?),
            ("CHAR", Some(n)) => ColumnType::Char(parse_num(n)?),
            ("DATETIME", None) => ColumnType::DateTime,
            ("TEXT", None) => ColumnType::Text,
            ("LONGTEXT", None) => ColumnType::LongText,
            ("BLOB", None) => ColumnType::Blob,
            _ => {
                return Err(DbError::Config(format!("Unsupported column type '{}'", s)));
            }
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = DbError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

fn default_true() -> bool {
    true
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Logical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Whether the column allows NULL (default: true).
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Default value as an SQL literal (`0`, `'PENDING'`, `CURRENT_TIMESTAMP`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Whether the column is filled by auto-increment / sequence emulation.
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    /// Nullable column without default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Mark as auto-increment. Implies NOT NULL.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.nullable = false;
        self
    }
}

/// Column reference inside an index, with an optional prefix length for
/// partial indexing of long text columns.
///
/// Written as `name` or `name(255)` in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexColumn {
    pub name: String,
    pub prefix_length: Option<u32>,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix_length: None,
        }
    }

    pub fn with_prefix(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            prefix_length: Some(length),
        }
    }
}

impl fmt::Display for IndexColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix_length {
            Some(len) => write!(f, "{}({})", self.name, len),
            None => write!(f, "{}", self.name),
        }
    }
}

impl TryFrom<String> for IndexColumn {
    type Error = DbError;

    fn try_from(value: String) -> Result<Self> {
        let value = value.trim();
        match value.find('(') {
            Some(open) if value.ends_with(')') => {
                let len = value[open + 1..value.len() - 1]
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| {
                        DbError::Config(format!(
                            "Invalid prefix length in index column '{}'",
                            value
                        ))
                    })?;
                Ok(IndexColumn::with_prefix(value[..open].trim(), len))
            }
            _ => Ok(IndexColumn::new(value)),
        }
    }
}

impl From<IndexColumn> for String {
    fn from(value: IndexColumn) -> Self {
        value.to_string()
    }
}

impl From<&str> for IndexColumn {
    fn from(value: &str) -> Self {
        IndexColumn::new(value)
    }
}

/// Index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed columns in order.
    pub columns: Vec<IndexColumn>,

    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    pub fn new<I, C>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<IndexColumn>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in declaration order.
    pub columns: Vec<Column>,

    /// Primary key column names (empty: no primary key).
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up a column by name (case-insensitive).
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// The auto-increment column, if any.
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Table-level auto-increment flag.
    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment_column().is_some()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(DbError::Config(format!("Table {} has no columns", self.name)));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.to_uppercase()) {
                return Err(DbError::Config(format!(
                    "Table {} declares column {} twice",
                    self.name, col.name
                )));
            }
        }

        for pk in &self.primary_key {
            if self.get_column(pk).is_none() {
                return Err(DbError::Config(format!(
                    "Primary key column {} is not a column of table {}",
                    pk, self.name
                )));
            }
        }

        let auto: Vec<&Column> = self.columns.iter().filter(|c| c.auto_increment).collect();
        if auto.len() > 1 {
            return Err(DbError::Config(format!(
                "Table {} has more than one auto-increment column",
                self.name
            )));
        }
        if let Some(col) = auto.first() {
            if !self
                .primary_key
                .iter()
                .any(|pk| pk.eq_ignore_ascii_case(&col.name))
            {
                return Err(DbError::Config(format!(
                    "Auto-increment column {}.{} must be part of the primary key",
                    self.name, col.name
                )));
            }
        }

        for idx in &self.indexes {
            if idx.columns.is_empty() {
                return Err(DbError::Config(format!(
                    "Index {} on {} has no columns",
                    idx.name, self.name
                )));
            }
            for ic in &idx.columns {
                if self.get_column(&ic.name).is_none() {
                    return Err(DbError::Config(format!(
                        "Index {} references unknown column {}.{}",
                        idx.name, self.name, ic.name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Owning table.
    pub table: String,

    /// Owning columns.
    pub columns: Vec<String>,

    /// Referenced table.
    pub ref_table: String,

    /// Referenced columns (same count as `columns`).
    pub ref_columns: Vec<String>,

    /// Delete child rows when the parent row is deleted.
    #[serde(default)]
    pub on_delete_cascade: bool,
}

impl ForeignKey {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
        ref_table: impl Into<String>,
        ref_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns,
            ref_table: ref_table.into(),
            ref_columns,
            on_delete_cascade: false,
        }
    }

    pub fn cascade(mut self) -> Self {
        self.on_delete_cascade = true;
        self
    }
}

fn default_one() -> i64 {
    1
}

fn default_cache() -> u32 {
    20
}

/// Sequence definition. Only rendered by dialects with native sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,

    #[serde(default = "default_one")]
    pub min_value: i64,

    /// Upper bound (None: NOMAXVALUE).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,

    #[serde(default = "default_one")]
    pub start: i64,

    #[serde(default = "default_one")]
    pub increment: i64,

    /// Number of values cached (below 2: NOCACHE).
    #[serde(default = "default_cache")]
    pub cache: u32,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_value: 1,
            max_value: None,
            start: 1,
            increment: 1,
            cache: default_cache(),
        }
    }
}

/// A complete schema: tables, foreign keys and sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,

    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default)]
    pub sequences: Vec<Sequence>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            foreign_keys: Vec::new(),
            sequences: Vec::new(),
        }
    }

    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn sequence(mut self, seq: Sequence) -> Self {
        self.sequences.push(seq);
        self
    }

    /// Load a schema definition from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a schema definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let schema: Schema = serde_yaml::from_str(yaml)?;
        Ok(schema)
    }

    /// Look up a table by name (case-insensitive).
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Check the structural invariants of the schema.
    ///
    /// The engine itself relies on the database to reject bad DDL; this is
    /// for callers that want to fail before touching the database.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for table in &self.tables {
            if !names.insert(table.name.to_uppercase()) {
                return Err(DbError::Config(format!(
                    "Table {} declared twice in schema {}",
                    table.name, self.name
                )));
            }
            table.validate()?;
        }

        let mut fk_names = HashSet::new();
        for fk in &self.foreign_keys {
            if !fk_names.insert(fk.name.to_uppercase()) {
                return Err(DbError::Config(format!(
                    "Foreign key {} declared twice in schema {}",
                    fk.name, self.name
                )));
            }
            if fk.columns.is_empty() || fk.columns.len() != fk.ref_columns.len() {
                return Err(DbError::Config(format!(
                    "Foreign key {} has {} columns but references {}",
                    fk.name,
                    fk.columns.len(),
                    fk.ref_columns.len()
                )));
            }
        }

        Ok(())
    }
}
