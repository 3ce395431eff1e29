//! Oracle connection over the `oracle` crate (ODPI-C).
//!
//! Binds are resolved by the placeholder names found in the statement text.
//! Parameters named `clob_*`, `blob_*` or `lob_*` are bound with an explicit
//! LOB type by value, so no temporary LOB locator outlives the statement.

use std::str::FromStr;

use chrono::NaiveDateTime;
use oracle::sql_type::OracleType;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::ConnectionUri;
use crate::core::cursor::Cursor;
use crate::core::params::{is_lob_name, placeholder_names, BindParams};
use crate::core::traits::{Connection, Connector};
use crate::core::value::SqlValue;
use crate::error::{DbError, Result};

/// Convert a driver error, keeping the `ORA-NNNNN` code when present.
fn map_err(err: oracle::Error) -> DbError {
    let message = err.to_string();
    let code = message
        .find("ORA-")
        .map(|pos| {
            message[pos..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .unwrap_or_else(|| "ORACLE".to_string());
    DbError::execution(code, message)
}

/// Opens Oracle sessions from a parsed URI.
pub struct OracleConnector {
    uri: ConnectionUri,
}

impl OracleConnector {
    pub fn new(uri: ConnectionUri) -> Self {
        Self { uri }
    }
}

impl Connector for OracleConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = oracle::Connection::connect(
            &self.uri.user,
            &self.uri.password,
            self.uri.easy_connect(),
        )
        .map_err(|e| DbError::Connection(format!("{}: {}", self.uri.redacted(), e)))?;

        info!(
            "Connected to Oracle: {}:{}/{}",
            self.uri.host, self.uri.port, self.uri.database
        );
        Ok(Box::new(OracleConnection { conn }))
    }

    fn database(&self) -> &str {
        &self.uri.database
    }
}

/// A live Oracle session.
pub struct OracleConnection {
    conn: oracle::Connection,
}

impl OracleConnection {
    fn bind_all(stmt: &mut oracle::Statement, sql: &str, params: &BindParams) -> Result<()> {
        for name in placeholder_names(sql, false) {
            let Some(value) = params.get(&name) else {
                continue;
            };
            Self::bind_one(stmt, &name, value)?;
        }
        Ok(())
    }

    fn bind_one(stmt: &mut oracle::Statement, name: &str, value: &SqlValue) -> Result<()> {
        let lower = name.to_ascii_lowercase();

        if is_lob_name(name) {
            let lob_type = if lower.starts_with("blob_") || matches!(value, SqlValue::Bytes(_)) {
                OracleType::BLOB
            } else {
                OracleType::CLOB
            };
            let result = match value {
                SqlValue::Null => stmt.bind(name, &lob_type),
                SqlValue::Bytes(b) => stmt.bind(name, &(b, &lob_type)),
                other => {
                    let text = other.to_string();
                    stmt.bind(name, &(&text, &lob_type))
                }
            };
            return result.map_err(map_err);
        }

        let result = match value {
            SqlValue::Null => stmt.bind(name, &OracleType::Varchar2(1)),
            SqlValue::Int(v) => stmt.bind(name, v),
            SqlValue::Float(v) => stmt.bind(name, v),
            SqlValue::Decimal(d) => {
                let text = d.to_string();
                stmt.bind(name, &(&text, &OracleType::Number(0, 0)))
            }
            SqlValue::Text(s) => stmt.bind(name, s),
            SqlValue::Bytes(b) => stmt.bind(name, b),
            SqlValue::DateTime(dt) => stmt.bind(name, dt),
        };
        result.map_err(map_err)
    }

    fn convert(value: &oracle::SqlValue) -> Result<SqlValue> {
        if value.is_null().map_err(map_err)? {
            return Ok(SqlValue::Null);
        }
        let oracle_type = value.oracle_type().map_err(map_err)?.clone();
        let converted = match oracle_type {
            OracleType::Number(_, _) | OracleType::Int64 | OracleType::UInt64 => {
                let text: String = value.get().map_err(map_err)?;
                if let Ok(i) = text.parse::<i64>() {
                    SqlValue::Int(i)
                } else {
                    match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
                        Ok(d) => SqlValue::Decimal(d),
                        Err(_) => SqlValue::Text(text),
                    }
                }
            }
            OracleType::BinaryFloat | OracleType::BinaryDouble | OracleType::Float(_) => {
                SqlValue::Float(value.get::<f64>().map_err(map_err)?)
            }
            OracleType::Date | OracleType::Timestamp(_) => {
                SqlValue::DateTime(value.get::<NaiveDateTime>().map_err(map_err)?)
            }
            OracleType::BLOB | OracleType::Raw(_) | OracleType::LongRaw => {
                SqlValue::Bytes(value.get::<Vec<u8>>().map_err(map_err)?)
            }
            _ => SqlValue::Text(value.get::<String>().map_err(map_err)?),
        };
        Ok(converted)
    }
}

impl Connection for OracleConnection {
    fn execute(&mut self, sql: &str, params: &BindParams, autocommit: bool) -> Result<Cursor> {
        let mut stmt = self.conn.statement(sql).build().map_err(map_err)?;
        Self::bind_all(&mut stmt, sql, params)?;

        if stmt.is_query() {
            let result_set = stmt.query(&[]).map_err(map_err)?;
            let columns: Vec<String> = result_set
                .column_info()
                .iter()
                .map(|c| c.name().to_string())
                .collect();

            let mut rows = Vec::new();
            for row_result in result_set {
                let row = row_result.map_err(map_err)?;
                let values = row
                    .sql_values()
                    .iter()
                    .map(Self::convert)
                    .collect::<Result<Vec<_>>>()?;
                rows.push(values);
            }
            debug!("Oracle query returned {} rows", rows.len());
            return Ok(Cursor::new(&columns, rows));
        }

        stmt.execute(&[]).map_err(map_err)?;
        let affected = stmt.row_count().map_err(map_err)?;
        drop(stmt);

        if autocommit {
            self.conn.commit().map_err(map_err)?;
        }
        Ok(Cursor::affected(affected))
    }

    fn begin(&mut self) -> Result<()> {
        // Oracle opens a transaction implicitly with the first write
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.commit().map_err(map_err)
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.rollback().map_err(map_err)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires an Oracle instance in CROSSDB_TEST_URI"]
    fn test_live_round_trip() {
        let uri = std::env::var("CROSSDB_TEST_URI").expect("CROSSDB_TEST_URI not set");
        let uri = ConnectionUri::parse(&uri).unwrap();
        let mut conn = OracleConnector::new(uri).connect().unwrap();
        let params = BindParams::new().with("v", 41);
        let mut cursor = conn
            .execute("SELECT :v + 1 AS ANSWER FROM DUAL", &params, true)
            .unwrap();
        assert!(cursor.advance());
        assert_eq!(cursor.field("answer").and_then(SqlValue::as_i64), Some(42));
        conn.close().unwrap();
    }
}
