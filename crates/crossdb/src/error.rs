//! Error types for the engine.
//!
//! Every fallible operation returns [`Result`]. Native driver errors are
//! converted into [`DbError::Execution`] at the backend boundary, so no
//! driver type ever crosses the engine API. The engine additionally keeps
//! the [`ErrorDescriptor`] of the most recent call for callers that prefer
//! to poll (`Engine::last_error`).

use std::fmt;

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// Invariant broken inside the engine or an impossible state reached.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// Operation has no implementation for the active dialect.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Native driver failure of any kind.
    #[error("Database execution error [{code}]: {message}")]
    Execution { code: String, message: String },

    /// Introspection could not locate an expected column.
    #[error("Column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },

    /// A write statement was issued while the engine is in read-only mode.
    #[error("Read-only mode: statement rejected: {0}")]
    ReadOnly(String),

    /// Connection could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was issued before `connect()`.
    #[error("Not connected to the database")]
    NotConnected,

    /// Configuration error (invalid YAML, bad URI, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (dump/restore files, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DbError {
    /// Create an Execution error from a native error code and message.
    pub fn execution(code: impl Into<String>, message: impl Into<String>) -> Self {
        DbError::Execution {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a ColumnNotFound error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        DbError::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Stable error-kind code used by [`ErrorDescriptor`].
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Unexpected(_) => "UNEXPECTED_ERROR",
            DbError::NotImplemented(_) => "NOT_IMPLEMENTED",
            DbError::Execution { .. } => "DATABASE_EXECUTION_ERROR",
            DbError::ColumnNotFound { .. } => "DATABASE_COLUMN_NOT_FOUND",
            DbError::ReadOnly(_) => "READ_ONLY_MODE",
            DbError::Connection(_) => "DATABASE_CONNECTION_ERROR",
            DbError::NotConnected => "DATABASE_NOT_CONNECTED",
            DbError::Config(_) => "CONFIGURATION_ERROR",
            DbError::Io(_) => "IO_ERROR",
            DbError::Json(_) | DbError::Yaml(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Snapshot of this error as a code/message pair.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            DbError::Config(_) | DbError::Yaml(_) => 1,
            DbError::Connection(_) | DbError::NotConnected => 2,
            DbError::Execution { .. } | DbError::ColumnNotFound { .. } => 3,
            DbError::ReadOnly(_) => 4,
            DbError::Io(_) => 7,
            _ => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Code/message pair describing the outcome of the last engine call.
///
/// An empty `code` means the call succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub code: String,
    pub message: String,
}

impl ErrorDescriptor {
    /// Descriptor for a successful call.
    pub fn ok() -> Self {
        Self::default()
    }

    /// True when the described call succeeded.
    pub fn is_ok(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "OK")
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            DbError::execution("ORA-00904", "invalid identifier").code(),
            "DATABASE_EXECUTION_ERROR"
        );
        assert_eq!(
            DbError::column_not_found("ALIQUOTS", "X").code(),
            "DATABASE_COLUMN_NOT_FOUND"
        );
        assert_eq!(DbError::ReadOnly("DELETE".into()).code(), "READ_ONLY_MODE");
    }

    #[test]
    fn test_descriptor_embeds_native_text() {
        let desc = DbError::execution("1054", "Unknown column 'nope'").descriptor();
        assert!(!desc.is_ok());
        assert_eq!(desc.code, "DATABASE_EXECUTION_ERROR");
        assert!(desc.message.contains("1054"));
        assert!(desc.message.contains("Unknown column"));
    }

    #[test]
    fn test_ok_descriptor() {
        let desc = ErrorDescriptor::ok();
        assert!(desc.is_ok());
        assert_eq!(desc.to_string(), "OK");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DbError::Config("x".into()).exit_code(), 1);
        assert_eq!(DbError::Connection("x".into()).exit_code(), 2);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(DbError::Io(io).exit_code(), 7);
    }
}
