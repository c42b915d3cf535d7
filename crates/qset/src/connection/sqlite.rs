//! `rusqlite` adapter.

use super::Connection;
use crate::error::{QueryError, QueryResult};
use crate::row::Row;
use crate::value::{TIMESTAMP_FORMAT, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

fn to_sqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Json(v) => match Value::from_json(v.clone()) {
            Value::Json(v) => SqlValue::Text(v.to_string()),
            Value::List(_) => SqlValue::Text(v.to_string()),
            scalar => to_sqlite(&scalar),
        },
        Value::List(_) => SqlValue::Text(value.to_json().to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn to_params(params: &[Value]) -> Vec<SqlValue> {
    params.iter().map(to_sqlite).collect()
}

/// A SQLite database behind a mutex.
///
/// Statements run on the calling task; SQLite executes one statement at a
/// time per connection anyway. The connection autocommits unless
/// [`SqliteConnection::begin`] opened a transaction, which
/// [`Connection::commit`] then commits.
#[derive(Debug)]
pub struct SqliteConnection {
    inner: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open (or create) a database file, or `:memory:`.
    ///
    /// Missing parent directories are created. WAL journaling and foreign key
    /// enforcement are switched on.
    pub fn open(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        if path != Path::new(":memory:") {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QueryError::Connection(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        tracing::info!(target: "qset.sql", path = %path.display(), "opening SQLite database");
        let conn = rusqlite::Connection::open(path)?;
        Self::configure(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> QueryResult<Self> {
        Self::configure(rusqlite::Connection::open_in_memory()?)
    }

    /// Wrap an already configured connection as-is.
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            inner: Mutex::new(conn),
        }
    }

    fn configure(conn: rusqlite::Connection) -> QueryResult<Self> {
        // journal_mode answers with the resulting mode ("memory" for in-memory DBs).
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(Self::from_connection(conn))
    }

    fn lock(&self) -> QueryResult<MutexGuard<'_, rusqlite::Connection>> {
        self.inner
            .lock()
            .map_err(|_| QueryError::Connection("SQLite connection mutex poisoned".into()))
    }

    /// Start an explicit transaction, ended by [`Connection::commit`].
    pub fn begin(&self) -> QueryResult<()> {
        self.lock()?.execute_batch("BEGIN")?;
        Ok(())
    }

    /// Roll back an open transaction, if any.
    pub fn rollback(&self) -> QueryResult<()> {
        let conn = self.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    /// Row id of the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> QueryResult<i64> {
        Ok(self.lock()?.last_insert_rowid())
    }

    fn query_rows(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let params = to_params(params);
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                record.push(name.as_str(), from_sqlite(row.get_ref(idx)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn execute_one(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        let conn = self.lock()?;
        let params = to_params(params);
        let affected = conn.execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn execute_batches(&self, sql: &str, batches: &[Vec<Value>]) -> QueryResult<u64> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let mut total = 0;
        for params in batches {
            let params = to_params(params);
            total += stmt.execute(rusqlite::params_from_iter(params.iter()))? as u64;
        }
        Ok(total)
    }

    fn commit_open(&self) -> QueryResult<()> {
        let conn = self.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    async fn execute_result(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        self.query_rows(sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        self.execute_one(sql, params)
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> QueryResult<u64> {
        self.execute_batches(sql, batches)
    }

    async fn commit(&self) -> QueryResult<()> {
        self.commit_open()
    }
}
