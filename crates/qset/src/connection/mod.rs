//! The connection collaborator.
//!
//! Queries never own a connection; every terminal operation borrows one.
//! A [`Connection`] executes finished SQL in the dialect's placeholder syntax
//! and returns rows as ordered field/value mappings.

mod logged;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use logged::LoggedConnection;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;

use crate::error::QueryResult;
use crate::row::Row;
use crate::value::Value;

/// A database handle able to run one parameterized statement at a time.
pub trait Connection: Send + Sync {
    /// Execute a statement and return every row it produces.
    fn execute_result(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send;

    /// Execute the same statement once per parameter set.
    ///
    /// The default implementation calls [`Connection::execute`] in a loop and
    /// sums the affected counts.
    fn execute_many(
        &self,
        sql: &str,
        batches: &[Vec<Value>],
    ) -> impl std::future::Future<Output = QueryResult<u64>> + Send {
        async move {
            let mut total = 0;
            for params in batches {
                total += self.execute(sql, params).await?;
            }
            Ok(total)
        }
    }

    /// Make previous writes durable.
    fn commit(&self) -> impl std::future::Future<Output = QueryResult<()>> + Send;
}
