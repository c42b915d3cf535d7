//! Convenient imports for typical `qset` usage.
//!
//! ```ignore
//! use qset::prelude::*;
//! ```

pub use crate::{
    Connection, Dialect, DialectKind, FromRow, FromValue, LoggedConnection, MemoryQuery, Postgres,
    Query, QueryError, QueryResult, Row, Sqlite, TSql, Value, lookups,
};

#[cfg(feature = "sqlite")]
pub use crate::SqliteConnection;
