//! Error types for database access

use std::time::Duration;

use thiserror::Error;

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors that can occur while talking to a monitored database
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The connection parameters cannot describe a usable pool
    #[error("invalid connection parameters: {0}")]
    InvalidParams(String),

    /// The driver rejected or failed the query
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// A cell of a recognized type could not be decoded
    #[error("failed to decode column '{column}' of type {type_name}: {source}")]
    Decode {
        column: String,
        type_name: String,
        #[source]
        source: sqlx::Error,
    },

    /// The query did not finish before the deadline
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl DatabaseError {
    /// Report a connection acquire that ran past `deadline` as a timeout
    ///
    /// The pool's acquire timeout is the query deadline, so an exhausted pool
    /// means the query could not run in time.
    pub fn with_deadline(self, deadline: Duration) -> Self {
        match self {
            DatabaseError::Query(sqlx::Error::PoolTimedOut) => DatabaseError::Timeout(deadline),
            other => other,
        }
    }
}
