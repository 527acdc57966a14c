//! Error types for the data access layer.
//!
//! The DAO logs every [`StoreError`] at the point where it is contained, so a
//! caller receiving one only has to decide what to do about it.

use crate::queries::QueryError;

/// Errors produced while talking to the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Establishing or closing a store session failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected a statement (syntax, constraint, missing table).
    #[error("statement error: {0}")]
    Statement(String),

    /// A result row did not have the shape the record mapping expects.
    #[error("cannot map column `{column}`: {reason}")]
    Mapping { column: String, reason: String },

    /// The query builder refused the record.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// An update or delete matched a different number of rows than one.
    #[error("expected {expected} affected row(s), store reported {actual}")]
    RowCount { expected: u64, actual: u64 },
}

impl StoreError {
    pub(crate) fn mapping(column: &str, reason: impl Into<String>) -> Self {
        StoreError::Mapping {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Statement(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::Connection(err.to_string()),
            sqlx::Error::ColumnNotFound(column) => {
                StoreError::mapping(&column, "column not present in result row")
            }
            other => StoreError::Statement(other.to_string()),
        }
    }
}
