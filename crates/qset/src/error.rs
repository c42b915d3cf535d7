//! Error types for qset

use thiserror::Error;

/// Result type alias for qset operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed table/column identifier (rejected before reaching the database)
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Malformed field name in a filter/order/search/update key
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    /// Operand not usable with the requested lookup (e.g. `__in` without a list)
    #[error("Invalid value for '{field}__{lookup}': {message}")]
    InvalidLookup {
        field: String,
        lookup: &'static str,
        message: String,
    },

    /// Base statement cannot be decomposed for the requested operation
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// Zero rows where exactly one was expected
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one row where exactly one was expected
    #[error("Multiple results: {0}")]
    MultipleResults(String),

    /// Ordering comparison between incomparable values (in-memory engine)
    #[error("Type mismatch: cannot compare {left} with {right}")]
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection-level failure that is not a driver error
    #[error("Connection error: {0}")]
    Connection(String),

    /// PostgreSQL driver error
    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQLite driver error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl QueryError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier(message.into())
    }

    /// Create an invalid field error
    pub fn invalid_field(message: impl Into<String>) -> Self {
        Self::InvalidField(message.into())
    }

    /// Create an invalid lookup operand error
    pub fn invalid_lookup(
        field: impl Into<String>,
        lookup: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidLookup {
            field: field.into(),
            lookup,
            message: message.into(),
        }
    }

    /// Create a malformed query error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedQuery(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a multiple results error
    pub fn multiple_results(message: impl Into<String>) -> Self {
        Self::MultipleResults(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a multiple results error
    pub fn is_multiple_results(&self) -> bool {
        matches!(self, Self::MultipleResults(_))
    }

    /// Check if this error was raised by identifier/field validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::InvalidField(_) | Self::InvalidLookup { .. }
        )
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
