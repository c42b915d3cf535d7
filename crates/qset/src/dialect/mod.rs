//! SQL dialects.
//!
//! A [`Dialect`] decides the few things that differ between backends:
//! placeholder token, LIKE escaping, case-insensitive matching, and how
//! LIMIT/OFFSET are spelled. Everything else (identifier quoting, predicate
//! shape, clause order) is shared.
//!
//! Pick a dialect at compile time with one of the unit structs, or at runtime
//! (e.g. from configuration) with [`DialectKind`].

mod postgres;
mod sqlite;
mod tsql;

pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use crate::error::QueryError;
use crate::statement::Statement;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Row window requested by `limit`/`offset`/`paginate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Bounds {
    pub fn is_unbounded(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }
}

/// Backend-specific SQL spelling.
pub trait Dialect: fmt::Debug + Clone + Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Positional placeholder token (`?` or `%s`).
    fn placeholder(&self) -> &'static str;

    /// `ESCAPE` clause appended to LIKE predicates, or `""` when backslash is
    /// already the default escape character.
    fn like_escape(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    /// Write `<column> LIKE <placeholder>` including the escape clause.
    fn write_like(&self, out: &mut String, column: &str) {
        out.push_str(column);
        out.push_str(" LIKE ");
        out.push_str(self.placeholder());
        out.push_str(self.like_escape());
    }

    /// Write a case-insensitive LIKE predicate against one placeholder.
    ///
    /// The default wraps both sides in `UPPER(...)`.
    fn write_ilike(&self, out: &mut String, column: &str) {
        out.push_str("UPPER(");
        out.push_str(column);
        out.push_str(") LIKE UPPER(");
        out.push_str(self.placeholder());
        out.push(')');
        out.push_str(self.like_escape());
    }

    /// Append the pagination clause(s) and bind their values in token order.
    ///
    /// `ordered` tells whether an ORDER BY has already been written.
    fn write_bounds(&self, stmt: &mut Statement, bounds: Bounds, ordered: bool);
}

/// The closed set of dialects, selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[serde(alias = "mssql", alias = "sqlserver", alias = "transact-sql")]
    TSql,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl DialectKind {
    pub const ALL: [DialectKind; 3] = [DialectKind::TSql, DialectKind::Postgres, DialectKind::Sqlite];
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsql" | "mssql" | "sqlserver" | "transact-sql" => Ok(DialectKind::TSql),
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            other => Err(QueryError::config(format!("unknown dialect: {other:?}"))),
        }
    }
}

impl From<TSql> for DialectKind {
    fn from(_: TSql) -> Self {
        DialectKind::TSql
    }
}

impl From<Postgres> for DialectKind {
    fn from(_: Postgres) -> Self {
        DialectKind::Postgres
    }
}

impl From<Sqlite> for DialectKind {
    fn from(_: Sqlite) -> Self {
        DialectKind::Sqlite
    }
}

macro_rules! delegate {
    ($self:ident, $d:ident => $e:expr) => {
        match $self {
            DialectKind::TSql => {
                let $d = TSql;
                $e
            }
            DialectKind::Postgres => {
                let $d = Postgres;
                $e
            }
            DialectKind::Sqlite => {
                let $d = Sqlite;
                $e
            }
        }
    };
}

impl Dialect for DialectKind {
    fn name(&self) -> &'static str {
        delegate!(self, d => d.name())
    }

    fn placeholder(&self) -> &'static str {
        delegate!(self, d => d.placeholder())
    }

    fn like_escape(&self) -> &'static str {
        delegate!(self, d => d.like_escape())
    }

    fn write_like(&self, out: &mut String, column: &str) {
        delegate!(self, d => d.write_like(out, column))
    }

    fn write_ilike(&self, out: &mut String, column: &str) {
        delegate!(self, d => d.write_ilike(out, column))
    }

    fn write_bounds(&self, stmt: &mut Statement, bounds: Bounds, ordered: bool) {
        delegate!(self, d => d.write_bounds(stmt, bounds, ordered))
    }
}
