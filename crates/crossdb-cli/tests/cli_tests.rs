//! CLI integration tests for crossdb.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the crossdb binary.
fn cmd() -> Command {
    Command::cargo_bin("crossdb").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("health-check"))
        .stdout(predicate::str::contains("apply-schema"))
        .stdout(predicate::str::contains("dump"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("upsert-sql"));
}

#[test]
fn test_apply_schema_subcommand_help() {
    cmd()
        .args(["apply-schema", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--simulate"))
        .stdout(predicate::str::contains("--fail-if-exists"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("crossdb"));
}

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: crossdb.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--uri"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// upsert-sql (no connection)
// =============================================================================

#[test]
fn test_upsert_sql_mysql() {
    cmd()
        .args([
            "upsert-sql",
            "--db-type",
            "mysql",
            "--table",
            "TAGS",
            "--key",
            "ID",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "INSERT INTO `TAGS` (`ID`) VALUES (:ID) ON DUPLICATE KEY UPDATE `ID` = `ID`",
        ));
}

#[test]
fn test_upsert_sql_oracle_merge() {
    cmd()
        .args([
            "upsert-sql",
            "--db-type",
            "oracle",
            "--table",
            "aliquots",
            "--key",
            "ID",
            "--update",
            "STATUS",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("MERGE INTO \"ALIQUOTS\" t USING DUAL"));
}

#[test]
fn test_upsert_sql_requires_key() {
    cmd()
        .args(["upsert-sql", "--db-type", "mysql", "--table", "TAGS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--key"));
}

#[test]
fn test_upsert_sql_unknown_db_type_exits_with_code_1() {
    cmd()
        .args([
            "upsert-sql",
            "--db-type",
            "postgres",
            "--table",
            "TAGS",
            "--key",
            "ID",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown database type"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_unsupported_scheme_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  uri: postgres://app:pw@localhost/trials").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_log_format_exits_with_code_1() {
    cmd()
        .args(["--log-format", "xml", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown log format"));
}

// =============================================================================
// Exit Code Tests - I/O and Connection
// =============================================================================

#[test]
fn test_missing_schema_file_exits_with_code_7() {
    cmd()
        .args([
            "--config",
            "nonexistent_config_file.yaml",
            "--uri",
            "mysql://app:pw@127.0.0.1:1/trials",
            "apply-schema",
            "nonexistent_schema.yaml",
        ])
        .assert()
        .code(7);
}

#[test]
fn test_unreachable_server_exits_with_code_2() {
    cmd()
        .args([
            "--config",
            "nonexistent_config_file.yaml",
            "--uri",
            "mysql://app:pw@127.0.0.1:1/trials",
            "health-check",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("pw@").not());
}
