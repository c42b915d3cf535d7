//! In-process connection that records statements and replays canned rows.

use super::Connection;
use crate::error::{QueryError, QueryResult};
use crate::row::Row;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct RecordingConnection {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    commits: Mutex<usize>,
    affected: u64,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    /// Queue the rows returned by the next `execute_result`.
    pub(crate) fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.results.lock().unwrap().push_back(rows);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_call(&self) -> (String, Vec<Value>) {
        self.calls().pop().expect("no statement was executed")
    }

    pub(crate) fn commits(&self) -> usize {
        *self.commits.lock().unwrap()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }
}

impl Connection for RecordingConnection {
    async fn execute_result(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        self.record(sql, params);
        Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        self.record(sql, params);
        Ok(self.affected)
    }

    async fn commit(&self) -> QueryResult<()> {
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }
}

/// A connection whose every call fails, for error propagation tests.
#[derive(Debug, Default)]
pub(crate) struct FailingConnection;

impl Connection for FailingConnection {
    async fn execute_result(&self, _sql: &str, _params: &[Value]) -> QueryResult<Vec<Row>> {
        Err(QueryError::Connection("connection refused".into()))
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> QueryResult<u64> {
        Err(QueryError::Connection("connection refused".into()))
    }

    async fn commit(&self) -> QueryResult<()> {
        Err(QueryError::Connection("commit failed".into()))
    }
}
