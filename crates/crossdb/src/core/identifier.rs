//! Identifier validation and quoting.
//!
//! Identifiers (table, column, index names) cannot be bound as parameters,
//! so every DDL or catalog statement that embeds one goes through these
//! functions. Quoting rules differ per dialect:
//!
//! - Oracle: `"NAME"`. Names are upper-cased before quoting so a quoted
//!   identifier matches the unquoted spelling Oracle folds to upper case.
//! - MySQL/MariaDB: `` `name` ``, case preserved.

use crate::error::{DbError, Result};

/// Maximum identifier length accepted by either backend.
/// - Oracle 12.2+: 128 bytes
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(DbError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an Oracle identifier.
///
/// ```
/// use crossdb::core::identifier::quote_oracle;
/// assert_eq!(quote_oracle("aliquots"), "\"ALIQUOTS\"");
/// assert_eq!(quote_oracle("a\"b"), "\"A\"\"B\"");
/// ```
pub fn quote_oracle(name: &str) -> String {
    format!("\"{}\"", name.to_uppercase().replace('"', "\"\""))
}

/// Quote a MySQL identifier using backticks.
///
/// ```
/// use crossdb::core::identifier::quote_mysql;
/// assert_eq!(quote_mysql("users"), "`users`");
/// assert_eq!(quote_mysql("table`name"), "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render a string as a single-quoted SQL literal.
///
/// Only used where the grammar does not accept a bind parameter (column
/// defaults, passwords in CREATE USER).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a string as a MySQL single-quoted literal, escaping backslashes.
pub fn quote_mysql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Check that a name is a plain bind-parameter identifier
/// (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_bind_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("ALIQUOTS").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad\0name").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_quote_oracle_uppercases() {
        assert_eq!(quote_oracle("id_patient"), "\"ID_PATIENT\"");
    }

    #[test]
    fn test_quote_mysql_preserves_case() {
        assert_eq!(quote_mysql("IdPatient"), "`IdPatient`");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_mysql_literal("a\\b'c"), "'a\\\\b''c'");
    }

    #[test]
    fn test_is_bind_name() {
        assert!(is_bind_name("ID_ALIQUOT"));
        assert!(is_bind_name("_x1"));
        assert!(!is_bind_name("1x"));
        assert!(!is_bind_name("with space"));
        assert!(!is_bind_name(""));
    }
}
