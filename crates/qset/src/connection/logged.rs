use super::Connection;
use crate::error::QueryResult;
use crate::row::Row;
use crate::value::Value;
use std::time::{Duration, Instant};
use tracing::Level;

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Which call produced a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Query,
    Execute,
    ExecuteMany,
    Commit,
}

/// A [`Connection`] wrapper that emits one `tracing` event per statement.
///
/// Events use target `qset.sql` and carry the SQL (optionally truncated),
/// parameter count, row or affected count and elapsed time.
///
/// ```ignore
/// use qset::{LoggedConnection, SqliteConnection};
/// use tracing::Level;
///
/// let conn = LoggedConnection::new(SqliteConnection::open_in_memory()?)
///     .level(Level::INFO)
///     .max_sql_length(120);
/// ```
#[derive(Debug, Clone)]
pub struct LoggedConnection<C> {
    inner: C,
    level: Level,
    max_sql_length: Option<usize>,
    enabled: bool,
}

impl<C> LoggedConnection<C> {
    /// Wrap a connection, logging at DEBUG with SQL truncated to 200 bytes.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            level: Level::DEBUG,
            max_sql_length: Some(200),
            enabled: true,
        }
    }

    /// Turn statement logging on.
    pub fn enable(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Turn statement logging off; statements still pass through.
    pub fn disable(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    fn emit(&self, call: Call, sql: &str, param_count: usize, rows: Option<u64>, elapsed: Duration) {
        if !self.enabled {
            return;
        }

        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        match rows {
            Some(rows) => emit_at_level!(
                self.level,
                target: "qset.sql",
                call = ?call,
                param_count,
                rows,
                elapsed_ms,
                sql = %sql,
            ),
            None => emit_at_level!(
                self.level,
                target: "qset.sql",
                call = ?call,
                param_count,
                elapsed_ms,
                sql = %sql,
                "statement failed",
            ),
        }
    }
}

impl<C: Connection> Connection for LoggedConnection<C> {
    async fn execute_result(&self, sql: &str, params: &[Value]) -> QueryResult<Vec<Row>> {
        let start = Instant::now();
        let result = self.inner.execute_result(sql, params).await;
        let rows = result.as_ref().ok().map(|rows| rows.len() as u64);
        self.emit(Call::Query, sql, params.len(), rows, start.elapsed());
        result
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult<u64> {
        let start = Instant::now();
        let result = self.inner.execute(sql, params).await;
        let affected = result.as_ref().ok().copied();
        self.emit(Call::Execute, sql, params.len(), affected, start.elapsed());
        result
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> QueryResult<u64> {
        let start = Instant::now();
        let result = self.inner.execute_many(sql, batches).await;
        let affected = result.as_ref().ok().copied();
        let param_count = batches.iter().map(Vec::len).sum();
        self.emit(Call::ExecuteMany, sql, param_count, affected, start.elapsed());
        result
    }

    async fn commit(&self) -> QueryResult<()> {
        let start = Instant::now();
        let result = self.inner.commit().await;
        let rows = result.as_ref().ok().map(|_| 0);
        self.emit(Call::Commit, "COMMIT", 0, rows, start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::RecordingConnection;

    #[test]
    fn truncate_sql_respects_char_boundaries() {
        let conn = LoggedConnection::new(RecordingConnection::new()).max_sql_length(10);
        assert_eq!(conn.truncate_sql("SELECT * FROM users"), "SELECT * F...");
        assert_eq!(conn.truncate_sql("short"), "short");

        let conn = LoggedConnection::new(RecordingConnection::new()).max_sql_length(2);
        assert_eq!(conn.truncate_sql("éé"), "é...");

        let conn = LoggedConnection::new(RecordingConnection::new()).no_truncate();
        assert_eq!(conn.truncate_sql("SELECT * FROM users"), "SELECT * FROM users");
    }

    #[tokio::test]
    async fn forwards_to_inner() {
        let conn = LoggedConnection::new(RecordingConnection::with_affected(3));
        let affected = conn.execute("DELETE FROM \"t\"", &[]).await.unwrap();
        assert_eq!(affected, 3);
        conn.commit().await.unwrap();
        assert_eq!(conn.inner().commits(), 1);
        assert_eq!(conn.inner().calls().len(), 1);
    }
}
