//! SQL construction for every store operation.
//!
//! Statements are built with sea-query and rendered for the backend selected by
//! [`DatabaseMode`]. Values are always passed through sea-query, which quotes
//! and escapes text literals for the target backend.

use clap::ValueEnum;
use serde::Deserialize;

pub mod code_data;
pub mod codes;
pub mod ddl;
pub mod imports;
pub mod tags;

/// Relational backend a statement is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseMode {
    /// Embedded SQLite database file
    Sqlite,
    /// PostgreSQL server
    Postgres,
}

/// Records the builders refuse to render
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("{table} record has no store id (got {id}); it must be inserted first")]
    UnsetId { table: &'static str, id: i64 },

    #[error("cannot build statement: {0}")]
    Build(String),
}

/// Render a sea-query statement with the builder matching `mode`
macro_rules! render {
    ($stmt:expr, $mode:expr) => {
        match $mode {
            $crate::queries::DatabaseMode::Sqlite => $stmt.to_string(sea_query::SqliteQueryBuilder),
            $crate::queries::DatabaseMode::Postgres => {
                $stmt.to_string(sea_query::PostgresQueryBuilder)
            }
        }
    };
}
pub(crate) use render;

/// Reject ids that cannot address a stored row
pub(crate) fn require_id(table: &'static str, id: i64) -> Result<i64, QueryError> {
    if id <= 0 {
        return Err(QueryError::UnsetId { table, id });
    }
    Ok(id)
}
