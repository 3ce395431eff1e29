//! Scripted in-memory backend for engine tests.
//!
//! Every statement is recorded. Responses are chosen by the first rule
//! whose SQL fragment (and optional bind value) matches; unmatched
//! statements return an empty cursor, so every existence check answers
//! "no" unless scripted otherwise.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use crossdb::core::traits::{Connection, Connector, Dialect};
use crossdb::{
    BindParams, Cursor, DbError, Engine, EngineOptions, QueryLogEntry, QueryLogger, SqlValue,
};

/// Scripted response.
#[derive(Debug, Clone)]
pub enum Response {
    Rows(Vec<String>, Vec<Vec<SqlValue>>),
    Affected(u64),
    Fail(String, String),
}

impl Response {
    fn to_result(&self) -> crossdb::Result<Cursor> {
        match self {
            Response::Rows(columns, rows) => Ok(Cursor::new(columns.as_slice(), rows.clone())),
            Response::Affected(n) => Ok(Cursor::affected(*n)),
            Response::Fail(code, message) => Err(DbError::execution(code.clone(), message.clone())),
        }
    }
}

/// Catalog answer "exists".
pub fn exists() -> Response {
    count(1)
}

pub fn count(n: i64) -> Response {
    Response::Rows(vec!["CNT".into()], vec![vec![SqlValue::Int(n)]])
}

pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Response {
    Response::Rows(columns.iter().map(|c| c.to_string()).collect(), rows)
}

pub fn fail(code: &str, message: &str) -> Response {
    Response::Fail(code.into(), message.into())
}

struct Rule {
    fragment: String,
    bind_value: Option<String>,
    response: Response,
    once: bool,
}

impl Rule {
    fn matches(&self, sql: &str, params: &BindParams) -> bool {
        if !sql.contains(&self.fragment) {
            return false;
        }
        match &self.bind_value {
            None => true,
            Some(expected) => params
                .iter()
                .any(|(_, v)| v.as_str().is_some_and(|s| s.eq_ignore_ascii_case(expected))),
        }
    }
}

/// One executed statement.
#[derive(Debug, Clone)]
pub struct Executed {
    pub sql: String,
    pub params: BindParams,
    pub autocommit: bool,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    executed: Vec<Executed>,
    events: Vec<String>,
    connect_failures: u32,
    connects: u32,
}

/// Shared handle to the scripted backend.
#[derive(Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<State>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_rule(&self, fragment: &str, bind_value: Option<&str>, response: Response, once: bool) {
        self.state.lock().unwrap().rules.push(Rule {
            fragment: fragment.to_string(),
            bind_value: bind_value.map(str::to_string),
            response,
            once,
        });
    }

    /// Answer every statement containing `fragment`.
    pub fn on(&self, fragment: &str, response: Response) {
        self.add_rule(fragment, None, response, false);
    }

    /// Answer statements containing `fragment` that bind `value`.
    pub fn on_bind(&self, fragment: &str, value: &str, response: Response) {
        self.add_rule(fragment, Some(value), response, false);
    }

    /// Answer the next statement containing `fragment` only.
    pub fn once(&self, fragment: &str, response: Response) {
        self.add_rule(fragment, None, response, true);
    }

    pub fn fail_connects(&self, n: u32) {
        self.state.lock().unwrap().connect_failures = n;
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.sql).collect()
    }

    /// Executed statements that are not catalog lookups.
    pub fn statements(&self) -> Vec<String> {
        self.sql()
            .into_iter()
            .filter(|s| {
                !s.contains("AS CNT")
                    && !s.contains("USER_TAB_COLUMNS")
                    && !s.contains("USER_TRIGGER_COLS")
                    && !s.contains("information_schema.COLUMNS")
            })
            .collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.executed.clear();
        state.events.clear();
    }

    pub fn connector(&self, database: &str) -> Box<dyn Connector> {
        Box::new(FakeConnector {
            db: self.clone(),
            database: database.to_string(),
        })
    }

    fn respond(&self, sql: &str, params: &BindParams, autocommit: bool) -> crossdb::Result<Cursor> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(Executed {
            sql: sql.to_string(),
            params: params.clone(),
            autocommit,
        });
        let Some(pos) = state.rules.iter().position(|r| r.matches(sql, params)) else {
            return Ok(Cursor::empty());
        };
        let result = state.rules[pos].response.to_result();
        if state.rules[pos].once {
            state.rules.remove(pos);
        }
        result
    }

    fn event(&self, event: impl Into<String>) {
        self.state.lock().unwrap().events.push(event.into());
    }
}

struct FakeConnector {
    db: FakeDb,
    database: String,
}

impl Connector for FakeConnector {
    fn connect(&self) -> crossdb::Result<Box<dyn Connection>> {
        let mut state = self.db.state.lock().unwrap();
        state.connects += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(DbError::Connection("connection refused".into()));
        }
        Ok(Box::new(FakeConnection { db: self.db.clone() }))
    }

    fn database(&self) -> &str {
        &self.database
    }
}

struct FakeConnection {
    db: FakeDb,
}

impl Connection for FakeConnection {
    fn execute(
        &mut self,
        sql: &str,
        params: &BindParams,
        autocommit: bool,
    ) -> crossdb::Result<Cursor> {
        self.db.respond(sql, params, autocommit)
    }

    fn execute_batch(&mut self, sql: &str, autocommit: bool) -> crossdb::Result<()> {
        self.db.event("batch");
        self.db.respond(sql, &BindParams::new(), autocommit).map(|_| ())
    }

    fn begin(&mut self) -> crossdb::Result<()> {
        self.db.event("begin");
        Ok(())
    }

    fn commit(&mut self) -> crossdb::Result<()> {
        self.db.event("commit");
        Ok(())
    }

    fn rollback(&mut self) -> crossdb::Result<()> {
        self.db.event("rollback");
        Ok(())
    }

    fn close(self: Box<Self>) -> crossdb::Result<()> {
        self.db.event("close");
        Ok(())
    }
}

/// Connected engine over the fake backend.
pub fn engine<D: Dialect>(dialect: D, db: &FakeDb, options: EngineOptions) -> Engine<D> {
    let mut engine = Engine::new(dialect, db.connector("trials"), options);
    engine.connect().unwrap();
    engine
}

/// Logger keeping every entry in memory.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<QueryLogEntry>>,
}

impl MemoryLogger {
    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl QueryLogger for MemoryLogger {
    fn log(&self, entry: &QueryLogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}
