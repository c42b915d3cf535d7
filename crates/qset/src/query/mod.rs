//! The immutable, dialect-aware query set.
//!
//! A [`Query`] starts from a base statement, accumulates structured clauses
//! through chained calls, and only assembles SQL when a terminal operation
//! (or [`Query::build`]) asks for it. Chained calls never modify the receiver,
//! so one base query can be branched into independent variants.
//!
//! # Example
//!
//! ```ignore
//! use qset::{lookups, Query, Row, Sqlite, SqliteConnection};
//!
//! let conn = SqliteConnection::open("app.db")?;
//! let tasks = Query::<Row, _>::table(Sqlite, "task")?;
//!
//! let open = tasks.filter(lookups! { "status" => "open" })?;
//! let urgent = open
//!     .filter(lookups! { "priority__gte" => 3 })?
//!     .order(["-priority", "title"])?
//!     .paginate(1, 20);
//!
//! let total = open.count(&conn).await?;
//! let page: Vec<Row> = urgent.execute(&conn).await?;
//! ```

#[cfg(test)]
mod tests;

use crate::clause::{Clauses, order_term};
use crate::condition::{Condition, translate_all};
use crate::connection::Connection;
use crate::dialect::{Dialect, DialectKind};
use crate::error::{QueryError, QueryResult};
use crate::ident::Ident;
use crate::row::{FromRow, Row};
use crate::statement::{Statement, count_placeholders};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

/// A query set producing records of type `T` in dialect `D`.
pub struct Query<T = Row, D = DialectKind> {
    dialect: D,
    clauses: Clauses,
    _record: PhantomData<fn() -> T>,
}

impl<T, D: Clone> Clone for Query<T, D> {
    fn clone(&self) -> Self {
        Self {
            dialect: self.dialect.clone(),
            clauses: self.clauses.clone(),
            _record: PhantomData,
        }
    }
}

impl<T, D: Dialect> fmt::Debug for Query<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stmt = self.build();
        f.debug_struct("Query")
            .field("dialect", &self.dialect.name())
            .field("sql", &stmt.sql())
            .field("params", &stmt.params())
            .finish()
    }
}

impl<T, D: Dialect> Query<T, D> {
    /// Query over a base statement (`SELECT ... FROM ... [WHERE ...] ...`).
    ///
    /// The statement text is trusted: it is split into clauses but never
    /// validated. Use [`Query::table`] to start from an untrusted table name.
    ///
    /// A trailing `;` is ignored and a top-level `LIMIT`/`OFFSET` becomes the
    /// query's bounds. Fails with [`QueryError::MalformedQuery`] when such a
    /// bound is not an integer literal or placeholder.
    pub fn new(dialect: D, base: impl AsRef<str>) -> QueryResult<Self> {
        let clauses = Clauses::parse(base.as_ref(), dialect.placeholder(), Vec::new())?;
        Ok(Self::from_clauses(dialect, clauses))
    }

    /// Query over a base statement whose existing placeholders are bound to `params`.
    ///
    /// Fails with [`QueryError::MalformedQuery`] when the number of
    /// placeholders in `base` differs from `params.len()`.
    pub fn with_params(dialect: D, base: impl AsRef<str>, params: Vec<Value>) -> QueryResult<Self> {
        let base = base.as_ref();
        let found = count_placeholders(base, dialect.placeholder());
        if found != params.len() {
            return Err(QueryError::malformed(format!(
                "base statement has {found} placeholder(s) but {} parameter(s) were given",
                params.len()
            )));
        }
        let clauses = Clauses::parse(base, dialect.placeholder(), params)?;
        Ok(Self::from_clauses(dialect, clauses))
    }

    /// `SELECT * FROM "<table>"` with a validated table name.
    pub fn table(dialect: D, table: &str) -> QueryResult<Self> {
        let table = Ident::parse(table)?;
        Self::new(dialect, format!("SELECT * FROM {table}"))
    }

    fn from_clauses(dialect: D, clauses: Clauses) -> Self {
        Self {
            dialect,
            clauses,
            _record: PhantomData,
        }
    }

    fn derive(&self, f: impl FnOnce(&mut Clauses)) -> Self {
        let mut next = self.clone();
        f(&mut next.clauses);
        next
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    // ==================== Chaining ====================

    /// AND one predicate per `(key, value)` pair, in pair order.
    ///
    /// Keys use the `field__operator` grammar; unknown operators mean `exact`.
    pub fn filter<I, K, V>(&self, predicates: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let conditions = translate_all(&self.dialect, predicates)?;
        Ok(self.derive(|c| c.push_where(conditions)))
    }

    /// Like [`Query::filter`] with each predicate wrapped in `NOT (...)`.
    pub fn exclude<I, K, V>(&self, predicates: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let conditions = translate_all(&self.dialect, predicates)?;
        Ok(self.derive(|c| c.push_where(conditions.into_iter().map(Condition::negate))))
    }

    /// Case-insensitive substring match; returns an unchanged copy when
    /// `field` or `needle` is empty.
    pub fn search(&self, field: &str, needle: &str) -> QueryResult<Self> {
        if field.is_empty() || needle.is_empty() {
            return Ok(self.clone());
        }
        let condition = Condition::search(&self.dialect, field, needle)?;
        Ok(self.derive(|c| c.push_where([condition])))
    }

    /// Append ORDER BY terms; `-field` sorts descending.
    pub fn order<I, S>(&self, fields: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = fields
            .into_iter()
            .map(|f| order_term(f.as_ref()))
            .collect::<QueryResult<Vec<_>>>()?;
        if terms.is_empty() {
            return Ok(self.clone());
        }
        Ok(self.derive(|c| c.push_order(terms)))
    }

    /// Replace the GROUP BY clause with the given columns.
    pub fn group_by<I, S>(&self, fields: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = fields
            .into_iter()
            .map(|f| Ident::field(f.as_ref()))
            .collect::<QueryResult<Vec<_>>>()?;
        if columns.is_empty() {
            return Ok(self.clone());
        }
        Ok(self.derive(|c| c.set_group_by(columns)))
    }

    pub fn limit(&self, n: i64) -> Self {
        self.derive(|c| c.bounds.limit = Some(n))
    }

    pub fn offset(&self, n: i64) -> Self {
        self.derive(|c| c.bounds.offset = Some(n))
    }

    /// Rows `range.start..range.end` of the current result.
    pub fn slice(&self, range: Range<i64>) -> Self {
        let start = range.start.max(0);
        let len = range.end.saturating_sub(start).max(0);
        self.derive(|c| {
            let base = c.bounds.offset.unwrap_or(0);
            c.bounds.offset = Some(base.saturating_add(start));
            c.bounds.limit = Some(match c.bounds.limit {
                Some(limit) => len.min(limit.saturating_sub(start).max(0)),
                None => len,
            });
        })
    }

    /// 1-indexed page: `offset((page - 1) * page_size).limit(page_size)`.
    pub fn paginate(&self, page: i64, page_size: i64) -> Self {
        self.offset(page.saturating_sub(1).max(0).saturating_mul(page_size))
            .limit(page_size)
    }

    // ==================== Inspection ====================

    /// The assembled SELECT and its parameters.
    pub fn build(&self) -> Statement {
        self.clauses.select(&self.dialect)
    }

    pub fn sql(&self) -> String {
        self.build().into_parts().0
    }

    pub fn params(&self) -> Vec<Value> {
        self.build().into_parts().1
    }

    /// The statement [`Query::count`] runs.
    pub fn count_statement(&self) -> Statement {
        self.clauses.count(&self.dialect)
    }

    fn log(&self, op: &'static str, stmt: &Statement) {
        tracing::debug!(
            target: "qset.query",
            op,
            dialect = self.dialect.name(),
            sql = %stmt.sql(),
            params = ?stmt.params(),
        );
    }
}

impl<T: FromRow, D: Dialect> Query<T, D> {
    /// Run the query and map every row through [`FromRow`].
    pub async fn execute<C: Connection>(&self, conn: &C) -> QueryResult<Vec<T>> {
        let stmt = self.build();
        self.log("execute", &stmt);
        let rows = conn.execute_result(stmt.sql(), stmt.params()).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Same as [`Query::execute`].
    pub async fn list<C: Connection>(&self, conn: &C) -> QueryResult<Vec<T>> {
        self.execute(conn).await
    }

    /// `SELECT COUNT(*)` over the filtered query, ignoring order and bounds.
    pub async fn count<C: Connection>(&self, conn: &C) -> QueryResult<i64> {
        let stmt = self.count_statement();
        self.log("count", &stmt);
        let rows = conn.execute_result(stmt.sql(), stmt.params()).await?;
        match rows.first() {
            Some(row) => row.try_get::<i64>("query_count"),
            None => Err(QueryError::decode("query_count", "count returned no rows")),
        }
    }

    /// Same as [`Query::count`]; never materializes the rows.
    pub async fn len<C: Connection>(&self, conn: &C) -> QueryResult<i64> {
        self.count(conn).await
    }

    /// The first record, or `None` when nothing matches.
    pub async fn first<C: Connection>(&self, conn: &C) -> QueryResult<Option<T>> {
        let one = self.limit(1);
        let stmt = one.build();
        one.log("first", &stmt);
        let rows = conn.execute_result(stmt.sql(), stmt.params()).await?;
        rows.first().map(T::from_row).transpose()
    }

    pub async fn exists<C: Connection>(&self, conn: &C) -> QueryResult<bool> {
        Ok(self.first(conn).await?.is_some())
    }

    /// Exactly one record matching `predicates`.
    ///
    /// Issues a single statement bounded to two rows. Fails with
    /// [`QueryError::NotFound`] or [`QueryError::MultipleResults`].
    pub async fn get<C, I, K, V>(&self, conn: &C, predicates: I) -> QueryResult<T>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let narrowed = self.filter(predicates)?;
        let bound = narrowed.clauses.bounds.limit.map_or(2, |n| n.min(2));
        let probe = narrowed.limit(bound);
        let stmt = probe.build();
        probe.log("get", &stmt);
        let rows = conn.execute_result(stmt.sql(), stmt.params()).await?;
        match rows.as_slice() {
            [row] => T::from_row(row),
            [] => Err(QueryError::not_found("no row matches the given predicates")),
            _ => Err(QueryError::multiple_results(
                "more than one row matches the given predicates",
            )),
        }
    }

    /// `DELETE FROM <target> [WHERE ...]`, then commit. Returns affected rows.
    pub async fn delete<C: Connection>(&self, conn: &C) -> QueryResult<u64> {
        let stmt = self.clauses.delete(&self.dialect)?;
        self.log("delete", &stmt);
        let affected = conn.execute(stmt.sql(), stmt.params()).await?;
        conn.commit().await?;
        Ok(affected)
    }

    /// `UPDATE <target> SET ... [WHERE ...]`, then commit. Returns affected rows.
    ///
    /// Lists and JSON containers are stored as JSON text.
    pub async fn update<C, I, K, V>(&self, conn: &C, assignments: I) -> QueryResult<u64>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let assignments = assignments
            .into_iter()
            .map(|(k, v)| -> QueryResult<(Ident, Value)> {
                Ok((Ident::field(k.as_ref())?, v.into()))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        let stmt = self.clauses.update(&self.dialect, assignments)?;
        self.log("update", &stmt);
        let affected = conn.execute(stmt.sql(), stmt.params()).await?;
        conn.commit().await?;
        Ok(affected)
    }
}
