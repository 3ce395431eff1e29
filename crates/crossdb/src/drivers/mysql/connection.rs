//! MySQL/MariaDB connection over `mysql_async`.
//!
//! The engine API is synchronous, so each connection owns a current-thread
//! tokio runtime and blocks on it for every call. Statements without binds
//! use the text protocol (everything is preparable there, including
//! multi-statement scripts); statements with binds are prepared and use
//! mysql_async's named `:param` support.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use mysql_async::consts::ColumnType as MyType;
use mysql_async::prelude::*;
use mysql_async::{Column as MyColumn, Conn, OptsBuilder, Params, Value};
use rust_decimal::Decimal;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::config::ConnectionUri;
use crate::core::cursor::Cursor;
use crate::core::params::{placeholder_names, BindParams};
use crate::core::traits::{Connection, Connector};
use crate::core::value::SqlValue;
use crate::error::{DbError, Result};

/// Character set number MySQL reports for binary strings.
const BINARY_CHARSET: u16 = 63;

fn map_err(err: mysql_async::Error) -> DbError {
    match &err {
        mysql_async::Error::Server(server) => {
            DbError::execution(server.code.to_string(), server.message.clone())
        }
        other => DbError::execution("MYSQL", other.to_string()),
    }
}

/// Opens MySQL/MariaDB sessions from a parsed URI.
pub struct MysqlConnector {
    uri: ConnectionUri,
}

impl MysqlConnector {
    pub fn new(uri: ConnectionUri) -> Self {
        Self { uri }
    }
}

impl Connector for MysqlConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::Connection(format!("starting MySQL runtime: {}", e)))?;

        let opts = OptsBuilder::default()
            .ip_or_hostname(self.uri.host.as_str())
            .tcp_port(self.uri.port)
            .db_name(Some(self.uri.database.as_str()))
            .user(Some(self.uri.user.as_str()))
            .pass(Some(self.uri.password.as_str()))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        let conn = runtime
            .block_on(Conn::new(opts))
            .map_err(|e| DbError::Connection(format!("{}: {}", self.uri.redacted(), e)))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            self.uri.host, self.uri.port, self.uri.database
        );
        Ok(Box::new(MysqlConnection { runtime, conn }))
    }

    fn database(&self) -> &str {
        &self.uri.database
    }
}

/// A live MySQL/MariaDB session.
pub struct MysqlConnection {
    runtime: Runtime,
    conn: Conn,
}

macro_rules! drain {
    ($result:expr) => {{
        let result = $result;
        let columns: Vec<MyColumn> = result.columns_ref().to_vec();
        let rows: Vec<mysql_async::Row> = result.collect_and_drop().await?;
        Ok::<_, mysql_async::Error>((columns, rows))
    }};
}

impl MysqlConnection {
    /// Named params keyed by the spelling used in the statement.
    fn named_params(sql: &str, params: &BindParams) -> Params {
        let named: HashMap<Vec<u8>, Value> = placeholder_names(sql, true)
            .into_iter()
            .filter_map(|name| {
                params
                    .get(&name)
                    .map(|v| (name.into_bytes(), Self::to_mysql(v)))
            })
            .collect();
        if named.is_empty() {
            Params::Empty
        } else {
            Params::Named(named)
        }
    }

    fn to_mysql(value: &SqlValue) -> Value {
        match value {
            SqlValue::Null => Value::NULL,
            SqlValue::Int(v) => Value::Int(*v),
            SqlValue::Float(v) => Value::Double(*v),
            SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
            SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
            SqlValue::Bytes(b) => Value::Bytes(b.clone()),
            SqlValue::DateTime(dt) => Value::Date(
                dt.year() as u16,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
                dt.nanosecond() / 1_000,
            ),
        }
    }

    fn from_mysql(value: &Value, column: &MyColumn) -> SqlValue {
        match value {
            Value::NULL => SqlValue::Null,
            Value::Int(v) => SqlValue::Int(*v),
            Value::UInt(v) => match i64::try_from(*v) {
                Ok(i) => SqlValue::Int(i),
                Err(_) => SqlValue::Decimal(Decimal::from(*v)),
            },
            Value::Float(v) => SqlValue::Float(*v as f64),
            Value::Double(v) => SqlValue::Float(*v),
            Value::Date(y, mo, d, h, mi, s, us) => {
                NaiveDate::from_ymd_opt(*y as i32, *mo as u32, *d as u32)
                    .and_then(|date| date.and_hms_micro_opt(*h as u32, *mi as u32, *s as u32, *us))
                    .map(SqlValue::DateTime)
                    // zero dates have no chrono representation
                    .unwrap_or(SqlValue::Null)
            }
            Value::Time(neg, days, h, mi, s, _) => {
                let hours = *days * 24 + *h as u32;
                SqlValue::Text(format!(
                    "{}{:02}:{:02}:{:02}",
                    if *neg { "-" } else { "" },
                    hours,
                    mi,
                    s
                ))
            }
            Value::Bytes(bytes) => Self::from_text_protocol(bytes, column),
        }
    }

    fn from_text_protocol(bytes: &[u8], column: &MyColumn) -> SqlValue {
        let text = || String::from_utf8_lossy(bytes).into_owned();
        match column.column_type() {
            MyType::MYSQL_TYPE_TINY
            | MyType::MYSQL_TYPE_SHORT
            | MyType::MYSQL_TYPE_LONG
            | MyType::MYSQL_TYPE_INT24
            | MyType::MYSQL_TYPE_LONGLONG
            | MyType::MYSQL_TYPE_YEAR => {
                let t = text();
                match t.parse::<i64>() {
                    Ok(i) => SqlValue::Int(i),
                    Err(_) => Decimal::from_str(&t)
                        .map(SqlValue::Decimal)
                        .unwrap_or(SqlValue::Text(t)),
                }
            }
            MyType::MYSQL_TYPE_DECIMAL | MyType::MYSQL_TYPE_NEWDECIMAL => {
                let t = text();
                Decimal::from_str(&t)
                    .map(SqlValue::Decimal)
                    .unwrap_or(SqlValue::Text(t))
            }
            MyType::MYSQL_TYPE_FLOAT | MyType::MYSQL_TYPE_DOUBLE => {
                let t = text();
                t.parse::<f64>()
                    .map(SqlValue::Float)
                    .unwrap_or(SqlValue::Text(t))
            }
            MyType::MYSQL_TYPE_DATETIME
            | MyType::MYSQL_TYPE_DATETIME2
            | MyType::MYSQL_TYPE_TIMESTAMP
            | MyType::MYSQL_TYPE_TIMESTAMP2
            | MyType::MYSQL_TYPE_DATE
            | MyType::MYSQL_TYPE_NEWDATE => {
                let t = text();
                NaiveDateTime::parse_from_str(&t, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .or_else(|| {
                        NaiveDate::parse_from_str(&t, "%Y-%m-%d")
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null)
            }
            MyType::MYSQL_TYPE_TINY_BLOB
            | MyType::MYSQL_TYPE_MEDIUM_BLOB
            | MyType::MYSQL_TYPE_LONG_BLOB
            | MyType::MYSQL_TYPE_BLOB
            | MyType::MYSQL_TYPE_VAR_STRING
            | MyType::MYSQL_TYPE_STRING
            | MyType::MYSQL_TYPE_VARCHAR
                if column.character_set() == BINARY_CHARSET =>
            {
                SqlValue::Bytes(bytes.to_vec())
            }
            _ => match String::from_utf8(bytes.to_vec()) {
                Ok(s) => SqlValue::Text(s),
                Err(e) => SqlValue::Bytes(e.into_bytes()),
            },
        }
    }

    fn to_cursor(columns: Vec<MyColumn>, rows: Vec<mysql_async::Row>, affected: u64) -> Cursor {
        let names: Vec<String> = columns.iter().map(|c| c.name_str().into_owned()).collect();
        let values = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        row.as_ref(i)
                            .map(|v| Self::from_mysql(v, col))
                            .unwrap_or(SqlValue::Null)
                    })
                    .collect()
            })
            .collect();
        Cursor::new(&names, values).with_affected_rows(affected)
    }
}

impl Connection for MysqlConnection {
    fn execute(&mut self, sql: &str, params: &BindParams, _autocommit: bool) -> Result<Cursor> {
        let params = Self::named_params(sql, params);
        let Self { runtime, conn } = self;

        let (columns, rows) = runtime
            .block_on(async {
                match params {
                    Params::Empty => drain!(conn.query_iter(sql).await?),
                    params => drain!(conn.exec_iter(sql, params).await?),
                }
            })
            .map_err(map_err)?;

        let affected = conn.affected_rows();
        debug!("MySQL statement returned {} rows, {} affected", rows.len(), affected);
        Ok(Self::to_cursor(columns, rows, affected))
    }

    fn execute_batch(&mut self, sql: &str, _autocommit: bool) -> Result<()> {
        let Self { runtime, conn } = self;
        runtime.block_on(conn.query_drop(sql)).map_err(map_err)
    }

    fn begin(&mut self) -> Result<()> {
        self.execute_batch("START TRANSACTION", false)
    }

    fn commit(&mut self) -> Result<()> {
        self.execute_batch("COMMIT", false)
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute_batch("ROLLBACK", false)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let MysqlConnection { runtime, conn } = *self;
        runtime.block_on(conn.disconnect()).map_err(map_err)
    }
}
