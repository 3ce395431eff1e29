//! Engine core: one connection, the statement pipeline and transactions.
//!
//! Every public call goes through [`Engine::tracked`], which records the
//! outcome in [`Engine::last_error`] in addition to returning it. DDL and
//! catalog operations live in the [`ddl`] and [`introspect`] submodules.

mod ddl;
mod introspect;
pub mod logging;

pub use logging::{QueryLogEntry, QueryLogger, TracingLogger};

use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{Config, ConnectionUri};
use crate::core::cursor::Cursor;
use crate::core::params::{prune_unused, BindParams};
use crate::core::statement::{classify, leading_keyword};
use crate::core::traits::{BatchPlan, Connection, Connector, Dialect, Page};
use crate::core::value::SqlValue;
use crate::drivers::{connector_for, DialectImpl};
use crate::error::{DbError, ErrorDescriptor, Result};

/// Base delay between connection attempts in milliseconds.
/// Uses linear backoff: 200ms, 400ms, 600ms, ...
const CONNECT_RETRY_DELAY_MS: u64 = 200;

/// Maximum statement length quoted in read-only errors.
const STATEMENT_SUMMARY_LEN: usize = 80;

/// Behavior switches fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject INSERT/UPDATE/DELETE/MERGE/REPLACE.
    pub read_only: bool,

    /// Log non-read statements instead of executing them.
    pub simulate: bool,

    /// Pass every loggable statement to the query logger.
    pub log_queries: bool,

    /// Connection attempts before giving up.
    pub connect_attempts: u32,

    /// Overall deadline for all connection attempts.
    pub connect_timeout: Duration,

    /// Parameter values longer than this are truncated in query logs.
    pub log_param_max_len: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            simulate: false,
            log_queries: false,
            connect_attempts: 3,
            connect_timeout: Duration::from_secs(5),
            log_param_max_len: 100,
        }
    }
}

/// Cross-dialect database engine.
///
/// Holds at most one live connection. The dialect renders SQL, the
/// connection executes it.
pub struct Engine<D: Dialect = DialectImpl> {
    dialect: D,
    connector: Box<dyn Connector>,
    conn: Option<Box<dyn Connection>>,
    options: EngineOptions,
    logger: Arc<dyn QueryLogger>,
    in_transaction: bool,
    last_error: ErrorDescriptor,
}

impl Engine<DialectImpl> {
    /// Engine for a connection URI; the backend follows the URI scheme.
    pub fn from_uri(uri: &str, options: EngineOptions) -> Result<Self> {
        let uri = ConnectionUri::parse(uri)?;
        let dialect = DialectImpl::for_type(uri.db_type);
        let connector = connector_for(&uri)?;
        info!("Engine configured for {}", uri.redacted());
        Ok(Self::new(dialect, connector, options))
    }

    /// Engine for a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_uri(&config.database.uri, config.engine.to_options())
    }
}

impl<D: Dialect> Engine<D> {
    /// Create a disconnected engine.
    pub fn new(dialect: D, connector: Box<dyn Connector>, options: EngineOptions) -> Self {
        Self {
            dialect,
            connector,
            conn: None,
            options,
            logger: Arc::new(TracingLogger),
            in_transaction: false,
            last_error: ErrorDescriptor::ok(),
        }
    }

    /// Replace the default `tracing` query logger.
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Database (schema / service) name from the connection URI.
    pub fn database(&self) -> &str {
        self.connector.database()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Outcome of the most recent public call. Empty after a success.
    pub fn last_error(&self) -> &ErrorDescriptor {
        &self.last_error
    }

    pub fn transaction_in_course(&self) -> bool {
        self.in_transaction
    }

    /// Run an operation and record its outcome as the last error.
    fn tracked<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = op(self);
        self.last_error = match &result {
            Ok(_) => ErrorDescriptor::ok(),
            Err(e) => e.descriptor(),
        };
        result
    }

    // ===== Connection lifecycle =====

    /// Open the connection. Does nothing when already connected.
    ///
    /// Retries up to `connect_attempts` times within `connect_timeout`.
    pub fn connect(&mut self) -> Result<()> {
        self.tracked(|engine| {
            if engine.conn.is_some() {
                return Ok(());
            }
            let conn = engine.open_with_retry()?;
            engine.conn = Some(conn);
            engine.in_transaction = false;
            Ok(())
        })
    }

    fn open_with_retry(&self) -> Result<Box<dyn Connection>> {
        let attempts = self.options.connect_attempts.max(1);
        let deadline = Instant::now() + self.options.connect_timeout;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.connector.connect() {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    last_error = match e {
                        DbError::Connection(msg) => msg,
                        other => other.to_string(),
                    };
                    warn!(
                        "Connection attempt {}/{} failed: {}",
                        attempt, attempts, last_error
                    );
                }
            }

            if attempt == attempts {
                break;
            }
            let delay = Duration::from_millis(CONNECT_RETRY_DELAY_MS * attempt as u64);
            if Instant::now() + delay >= deadline {
                debug!("Connect timeout reached after {} attempts", attempt);
                break;
            }
            std::thread::sleep(delay);
        }

        Err(DbError::Connection(last_error))
    }

    /// Close the connection. An open transaction is rolled back first.
    /// Does nothing when not connected.
    pub fn disconnect(&mut self) -> Result<()> {
        self.tracked(|engine| {
            let Some(mut conn) = engine.conn.take() else {
                return Ok(());
            };
            if engine.in_transaction {
                warn!("Disconnecting with an open transaction; rolling back");
                engine.in_transaction = false;
                if let Err(e) = conn.rollback() {
                    warn!("Rollback on disconnect failed: {}", e);
                }
            }
            conn.close()?;
            debug!("Disconnected from {}", engine.connector.database());
            Ok(())
        })
    }

    fn connection(&mut self) -> Result<&mut Box<dyn Connection>> {
        self.conn.as_mut().ok_or(DbError::NotConnected)
    }

    // ===== Statements =====

    /// Execute a statement with named binds and return its cursor.
    #[track_caller]
    pub fn execute_bind_query(&mut self, sql: &str, params: &BindParams) -> Result<Cursor> {
        let caller = Location::caller();
        self.tracked(|engine| engine.run(sql, params, None, true, caller))
    }

    /// Execute a query restricted to a row window (1-based offset).
    #[track_caller]
    pub fn execute_paged(&mut self, sql: &str, params: &BindParams, page: Page) -> Result<Cursor> {
        let caller = Location::caller();
        self.tracked(|engine| engine.run(sql, params, Some(&page), true, caller))
    }

    /// Same pipeline as [`execute_bind_query`](Self::execute_bind_query),
    /// never passed to the query logger.
    #[track_caller]
    pub fn execute_quiet(&mut self, sql: &str, params: &BindParams) -> Result<Cursor> {
        let caller = Location::caller();
        self.tracked(|engine| engine.run(sql, params, None, false, caller))
    }

    /// Execute several statements as one batch, using the dialect's
    /// batching strategy.
    #[track_caller]
    pub fn execute_multiple_sql<S: AsRef<str>>(
        &mut self,
        statements: &[S],
        params: &BindParams,
    ) -> Result<()> {
        let caller = Location::caller();
        let statements: Vec<String> = statements.iter().map(|s| s.as_ref().to_string()).collect();
        self.tracked(|engine| engine.run_batch(&statements, params, caller))
    }

    /// The statement pipeline.
    fn run(
        &mut self,
        sql: &str,
        params: &BindParams,
        page: Option<&Page>,
        loggable: bool,
        caller: &'static Location<'static>,
    ) -> Result<Cursor> {
        let mut params = params.clone();
        for (_, value) in params.iter_mut() {
            if value.is_empty_text() {
                *value = SqlValue::Null;
            }
        }

        let kind = classify(sql);
        self.check_writable(sql)?;
        prune_unused(sql, &mut params, self.dialect.backslash_escapes());

        let sql = match page {
            Some(page) if !page.is_unbounded() => self.dialect.paginate(sql, page),
            _ => sql.to_string(),
        };

        if self.options.simulate && !kind.is_read() {
            let mut entry =
                QueryLogEntry::new(&sql, &params, self.options.log_param_max_len, caller);
            entry.simulated = true;
            self.logger.log(&entry);
            return Ok(Cursor::empty());
        }

        let autocommit = !self.in_transaction;
        let started = Instant::now();
        let result = self.connection()?.execute(&sql, &params, autocommit);

        if loggable && self.options.log_queries {
            let mut entry =
                QueryLogEntry::new(&sql, &params, self.options.log_param_max_len, caller);
            entry.duration = started.elapsed();
            entry.error = result.as_ref().err().map(|e| e.to_string());
            self.logger.log(&entry);
        }
        result
    }

    fn run_batch(
        &mut self,
        statements: &[String],
        params: &BindParams,
        caller: &'static Location<'static>,
    ) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        for sql in statements {
            self.check_writable(sql)?;
        }

        match self.dialect.batch_statements(statements, !params.is_empty()) {
            BatchPlan::Single(block) => {
                self.run(&block, params, None, true, caller)?;
            }
            BatchPlan::Script(script) => {
                let all_reads = statements.iter().all(|s| classify(s).is_read());
                if self.options.simulate && !all_reads {
                    let mut entry = QueryLogEntry::new(
                        &script,
                        &BindParams::new(),
                        self.options.log_param_max_len,
                        caller,
                    );
                    entry.simulated = true;
                    self.logger.log(&entry);
                    return Ok(());
                }
                let autocommit = !self.in_transaction;
                let started = Instant::now();
                let result = self.connection()?.execute_batch(&script, autocommit);
                if self.options.log_queries {
                    let mut entry = QueryLogEntry::new(
                        &script,
                        &BindParams::new(),
                        self.options.log_param_max_len,
                        caller,
                    );
                    entry.duration = started.elapsed();
                    entry.error = result.as_ref().err().map(|e| e.to_string());
                    self.logger.log(&entry);
                }
                result?;
            }
            BatchPlan::Sequential(list) => {
                for sql in &list {
                    self.run(sql, params, None, true, caller)?;
                }
            }
        }
        Ok(())
    }

    fn check_writable(&self, sql: &str) -> Result<()> {
        if self.options.read_only && classify(sql).is_write() {
            warn!("Read-only mode: rejected {}", leading_keyword(sql));
            return Err(DbError::ReadOnly(summarize(sql)));
        }
        Ok(())
    }

    // ===== Transactions =====

    /// Open a transaction. Does nothing when one is already open.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.tracked(|engine| {
            if engine.in_transaction {
                return Ok(());
            }
            engine.connection()?.begin()?;
            engine.in_transaction = true;
            Ok(())
        })
    }

    /// Commit the open transaction. Does nothing without one.
    pub fn commit(&mut self) -> Result<()> {
        self.tracked(|engine| {
            if !engine.in_transaction {
                return Ok(());
            }
            engine.connection()?.commit()?;
            engine.in_transaction = false;
            Ok(())
        })
    }

    /// Roll back the open transaction. Does nothing without one.
    pub fn rollback(&mut self) -> Result<()> {
        self.tracked(|engine| {
            if !engine.in_transaction {
                return Ok(());
            }
            engine.in_transaction = false;
            engine.connection()?.rollback()
        })
    }

    // ===== Dialect helpers =====

    /// Atomic insert-or-update statement keyed on `key_columns`. Bind names
    /// are the column names.
    pub fn build_insert_or_update_query<S: AsRef<str>>(
        &self,
        table: &str,
        key_columns: &[S],
        update_columns: &[S],
    ) -> String {
        let keys: Vec<String> = key_columns.iter().map(|s| s.as_ref().to_string()).collect();
        let updates: Vec<String> = update_columns
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        self.dialect.build_upsert_query(table, &keys, &updates)
    }

    /// Next value of a sequence, or `None` when the dialect has no native
    /// sequences (auto-increment assigns the value on insert).
    #[track_caller]
    pub fn next_sequence_value(&mut self, sequence: &str) -> Result<Option<i64>> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let Some(sql) = engine.dialect.next_sequence_value_sql(sequence) else {
                return Ok(None);
            };
            engine.fetch_id(&sql, caller).map(Some)
        })
    }

    /// Identifier generated by the last insert into `table` on this
    /// connection.
    #[track_caller]
    pub fn last_insert_id(&mut self, table: &str) -> Result<i64> {
        let caller = Location::caller();
        self.tracked(|engine| {
            let sql = engine.dialect.last_insert_id_sql(table);
            engine.fetch_id(&sql, caller)
        })
    }

    fn fetch_id(&mut self, sql: &str, caller: &'static Location<'static>) -> Result<i64> {
        let mut cursor = self.run(sql, &BindParams::new(), None, true, caller)?;
        if !cursor.advance() {
            return Err(DbError::Unexpected(format!("No row returned by: {}", sql)));
        }
        cursor
            .field("ID")
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| DbError::Unexpected(format!("Non-numeric ID returned by: {}", sql)))
    }
}

impl<D: Dialect> Drop for Engine<D> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.in_transaction {
                debug!("Dropping engine with an open transaction; it will not be committed");
            }
            if let Err(e) = conn.close() {
                warn!("Error closing connection: {}", e);
            }
        }
    }
}

/// First line of a statement, shortened for error messages.
fn summarize(sql: &str) -> String {
    let line = sql.trim().lines().next().unwrap_or("");
    if line.chars().count() <= STATEMENT_SUMMARY_LEN {
        line.to_string()
    } else {
        let cut: String = line.chars().take(STATEMENT_SUMMARY_LEN).collect();
        format!("{}...", cut)
    }
}
