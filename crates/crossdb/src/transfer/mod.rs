//! Table dump and restore in a line-oriented JSON format.
//!
//! The first line is a JSON array of column names, then one JSON array of
//! values per row:
//!
//! ```text
//! ["ID","NAME","CREATED","PAYLOAD"]
//! [1,"alpha","2024-03-01 10:00:00","AAEC"]
//! [2,null,"2024-03-02 11:30:00",null]
//! ```
//!
//! Decimals and datetimes are written as strings, BLOBs as base64. On
//! restore the target column types decide how strings are decoded.

use std::io::{BufRead, Write};
use std::str::FromStr;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::core::params::BindParams;
use crate::core::schema::ColumnType;
use crate::core::traits::Dialect;
use crate::core::value::{SqlValue, DATETIME_FORMAT};
use crate::engine::Engine;
use crate::error::{DbError, Result};

/// Rows inserted between commits during a restore.
pub const COMMIT_EVERY: u64 = 10;

/// Statistics from a dump or restore.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Rows written or inserted.
    pub rows: u64,

    /// Commits issued (restore only).
    pub commits: u64,

    /// Total elapsed time.
    pub duration: Duration,
}

/// Write every row of `table` to `writer`.
pub fn dump_table<D: Dialect, W: Write>(
    engine: &mut Engine<D>,
    table: &str,
    mut writer: W,
) -> Result<TransferStats> {
    let started = Instant::now();
    let sql = format!("SELECT * FROM {}", engine.dialect().quote_ident(table));
    let cursor = engine.execute_bind_query(&sql, &BindParams::new())?;

    serde_json::to_writer(&mut writer, cursor.column_names())?;
    writer.write_all(b"\n")?;

    let mut stats = TransferStats::default();
    for row in cursor {
        let values: Vec<serde_json::Value> = row.values().iter().map(SqlValue::to_json).collect();
        serde_json::to_writer(&mut writer, &values)?;
        writer.write_all(b"\n")?;
        stats.rows += 1;
    }
    writer.flush()?;

    stats.duration = started.elapsed();
    info!("{}: dumped {} rows", table, stats.rows);
    Ok(stats)
}

/// Insert the rows read from `reader` into `table`.
///
/// Commits every [`COMMIT_EVERY`] rows and calls `progress` with the
/// running row count after each commit. When the caller already has a
/// transaction open, rows join it and no commit is issued.
pub fn populate_table<D, R, F>(
    engine: &mut Engine<D>,
    table: &str,
    reader: R,
    mut progress: F,
) -> Result<TransferStats>
where
    D: Dialect,
    R: BufRead,
    F: FnMut(u64),
{
    let started = Instant::now();
    let mut lines = reader.lines().enumerate();

    let header: Vec<String> = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break serde_json::from_str(&line)?;
                }
            }
            None => return Ok(TransferStats::default()),
        }
    };

    let mut targets = Vec::with_capacity(header.len());
    for (i, name) in header.iter().enumerate() {
        let column = engine.require_column_info(table, name)?;
        targets.push((bind_name(i, &column.column_type), column.column_type));
    }

    let placeholders: Vec<String> = targets.iter().map(|(b, _)| format!(":{}", b)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        engine.dialect().quote_ident(table),
        engine.dialect().column_list(&header),
        placeholders.join(", ")
    );
    debug!("Restore statement: {}", sql);

    let own_transaction = !engine.transaction_in_course();
    if own_transaction {
        engine.begin_transaction()?;
    }

    let mut stats = TransferStats::default();
    let result = insert_rows(
        engine,
        &sql,
        &targets,
        &mut lines,
        &mut stats,
        own_transaction,
        &mut progress,
    );

    if let Err(e) = result {
        if own_transaction {
            engine.rollback()?;
        }
        return Err(e);
    }

    if stats.rows % COMMIT_EVERY != 0 {
        if own_transaction {
            engine.commit()?;
            stats.commits += 1;
        }
        progress(stats.rows);
    } else if own_transaction {
        // closes the empty transaction reopened after the last batch
        engine.commit()?;
    }

    stats.duration = started.elapsed();
    info!("{}: restored {} rows ({} commits)", table, stats.rows, stats.commits);
    Ok(stats)
}

fn insert_rows<D, I, F>(
    engine: &mut Engine<D>,
    sql: &str,
    targets: &[(String, ColumnType)],
    lines: &mut I,
    stats: &mut TransferStats,
    own_transaction: bool,
    progress: &mut F,
) -> Result<()>
where
    D: Dialect,
    I: Iterator<Item = (usize, std::io::Result<String>)>,
    F: FnMut(u64),
{
    for (line_no, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<serde_json::Value> = serde_json::from_str(&line)?;
        if values.len() != targets.len() {
            return Err(DbError::Unexpected(format!(
                "line {}: expected {} values, found {}",
                line_no + 1,
                targets.len(),
                values.len()
            )));
        }

        let mut params = BindParams::new();
        for ((name, ty), value) in targets.iter().zip(values) {
            let value = decode_value(value, ty)
                .map_err(|msg| DbError::Unexpected(format!("line {}: {}", line_no + 1, msg)))?;
            params.set(name, value);
        }
        engine.execute_quiet(sql, &params)?;
        stats.rows += 1;

        if stats.rows % COMMIT_EVERY == 0 {
            if own_transaction {
                engine.commit()?;
                engine.begin_transaction()?;
                stats.commits += 1;
            }
            progress(stats.rows);
        }
    }
    Ok(())
}

/// Bind name for the i-th column; LOB columns get the prefix that selects
/// LOB binding.
fn bind_name(i: usize, ty: &ColumnType) -> String {
    match ty {
        ColumnType::Blob => format!("blob_c{}", i),
        ColumnType::LongText => format!("clob_c{}", i),
        _ => format!("c{}", i),
    }
}

/// Decode a dumped JSON value for a column of the given type.
fn decode_value(
    value: serde_json::Value,
    ty: &ColumnType,
) -> std::result::Result<SqlValue, String> {
    use serde_json::Value;

    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Int(i64::from(b)),
        Value::Number(n) => match (n.as_i64(), ty) {
            (Some(i), ColumnType::Decimal { .. }) => SqlValue::Decimal(Decimal::from(i)),
            (Some(i), _) => SqlValue::Int(i),
            (None, ColumnType::Decimal { .. }) => Decimal::from_str(&n.to_string())
                .map(SqlValue::Decimal)
                .map_err(|e| format!("invalid decimal {}: {}", n, e))?,
            (None, _) => SqlValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => match ty {
            ColumnType::Blob => BASE64
                .decode(s.as_bytes())
                .map(SqlValue::Bytes)
                .map_err(|e| format!("invalid base64: {}", e))?,
            ColumnType::DateTime => NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
                .map(SqlValue::DateTime)
                .map_err(|e| format!("invalid datetime '{}': {}", s, e))?,
            ColumnType::Decimal { .. } => Decimal::from_str(&s)
                .map(SqlValue::Decimal)
                .map_err(|e| format!("invalid decimal '{}': {}", s, e))?,
            ColumnType::BigInt | ColumnType::Int | ColumnType::TinyInt => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|e| format!("invalid integer '{}': {}", s, e))?,
            _ => SqlValue::Text(s),
        },
        other => SqlValue::Text(other.to_string()),
    })
}
