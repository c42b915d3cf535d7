//! # qset
//!
//! Chainable, injection-safe query sets over SQL databases, plus the same
//! operator vocabulary over in-memory collections.
//!
//! ## Features
//!
//! - **Immutable chaining**: every `filter` / `exclude` / `order` / `limit` returns a new query
//! - **Injection-safe**: values are always bound; field and table names are validated and quoted
//! - **Three dialects**: T-SQL, PostgreSQL and SQLite placeholders, LIKE escaping and pagination
//! - **Operator suffixes**: `field__gte`, `field__in`, `field__icontains` and friends
//! - **Pluggable connections**: anything implementing [`Connection`]; `tokio-postgres` and `rusqlite` adapters included
//! - **SQL logging**: wrap a connection in [`LoggedConnection`] to trace every statement
//! - **In-memory engine**: [`MemoryQuery`] filters, orders and pages plain records
//!
//! ## Example
//!
//! ```ignore
//! use qset::prelude::*;
//!
//! let conn = SqliteConnection::open_in_memory()?;
//! let tasks: Query<Row, Sqlite> = Query::table(Sqlite, "task")?;
//!
//! let open = tasks
//!     .filter(lookups! { "status" => "open", "priority__gte" => 2 })?
//!     .order(["-priority", "id"])?
//!     .paginate(1, 20);
//!
//! for row in open.execute(&conn).await? {
//!     println!("{}", row.to_json());
//! }
//!
//! let done = tasks.filter(lookups! { "status" => "done" })?.delete(&conn).await?;
//! ```

mod clause;
pub mod condition;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod ident;
pub mod lookup;
pub mod memory;
pub mod prelude;
pub mod query;
pub mod row;
pub mod statement;
pub mod table;
pub mod value;

pub use condition::Condition;
pub use config::Settings;
pub use connection::{Connection, LoggedConnection};
pub use dialect::{Bounds, Dialect, DialectKind, Postgres, Sqlite, TSql};
pub use error::{QueryError, QueryResult};
pub use ident::{Ident, IntoIdent, quote_identifier};
pub use lookup::Lookup;
pub use memory::{FieldKind, FieldRegistry, MemoryQuery, Record};
pub use query::Query;
pub use row::{FromRow, FromValue, Row};
pub use statement::Statement;
pub use table::{create_table, insert, insert_many};
pub use value::Value;

#[cfg(feature = "sqlite")]
pub use connection::SqliteConnection;

/// Build an ordered list of `(key, Value)` predicates with mixed value types.
///
/// ```ignore
/// let q = users.filter(qset::lookups! { "age__gte" => 25, "name__icontains" => "jo" })?;
/// ```
#[macro_export]
macro_rules! lookups {
    () => {
        ::std::vec::Vec::<(&'static str, $crate::Value)>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$(($key, $crate::Value::from($value))),+]
    };
}
