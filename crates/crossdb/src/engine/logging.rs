//! Query logging.
//!
//! When `log_queries` is enabled the engine hands a [`QueryLogEntry`] to its
//! [`QueryLogger`] after every loggable statement. Simulated statements are
//! always logged, since logging is the only thing simulation does with them.

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::params::BindParams;

/// One executed (or simulated) statement.
#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    /// Statement text as sent to the server (after pagination).
    pub sql: String,

    /// Parameter names with values truncated for display.
    pub params: Vec<(String, String)>,

    /// Wall-clock time spent in the driver.
    pub duration: Duration,

    /// Call site of the public engine method.
    pub location: &'static Location<'static>,

    /// True when the statement was not sent to the server.
    pub simulated: bool,

    /// Error text when the statement failed.
    pub error: Option<String>,
}

impl QueryLogEntry {
    pub(crate) fn new(
        sql: &str,
        params: &BindParams,
        max_len: usize,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            sql: sql.to_string(),
            params: params
                .iter()
                .map(|(name, value)| (name.to_string(), value.display_truncated(max_len)))
                .collect(),
            duration: Duration::ZERO,
            location,
            simulated: false,
            error: None,
        }
    }

    /// Parameters rendered as `name=value, ...`.
    pub fn params_display(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Receiver for query log entries.
pub trait QueryLogger: Send + Sync {
    fn log(&self, entry: &QueryLogEntry);
}

impl<L: QueryLogger + ?Sized> QueryLogger for Arc<L> {
    fn log(&self, entry: &QueryLogEntry) {
        (**self).log(entry)
    }
}

/// Default logger emitting `tracing` events on the `crossdb::query` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log(&self, entry: &QueryLogEntry) {
        let caller = format!("{}:{}", entry.location.file(), entry.location.line());
        match &entry.error {
            Some(error) => warn!(
                target: "crossdb::query",
                caller = %caller,
                duration_ms = entry.duration.as_millis() as u64,
                "Query failed: {} [{}]: {}",
                entry.sql,
                entry.params_display(),
                error
            ),
            None if entry.simulated => info!(
                target: "crossdb::query",
                caller = %caller,
                "Simulated: {} [{}]",
                entry.sql,
                entry.params_display()
            ),
            None => info!(
                target: "crossdb::query",
                caller = %caller,
                duration_ms = entry.duration.as_millis() as u64,
                "Query: {} [{}]",
                entry.sql,
                entry.params_display()
            ),
        }
    }
}
