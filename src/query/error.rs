//! Per-request compilation and execution errors.

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error type for compiling and executing one request.
///
/// Errors are scoped to a single request or a single live-query refetch.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown root field: {0}")]
    UnknownRoot(String),

    #[error("Unknown field '{field}' on type '{object}'")]
    UnknownField { object: String, field: String },

    #[error("Malformed selection: {0}")]
    MalformedSelection(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Timed out waiting for a pooled connection")]
    PoolTimeout,

    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl QueryError {
    /// Errors that call for backing off before trying again.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            QueryError::PoolTimeout | QueryError::Database(sqlx::Error::PoolTimedOut)
        )
    }

    /// Stable identifier reported in protocol error objects.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::UnknownRoot(_) => "unknown_root",
            QueryError::UnknownField { .. } => "unknown_field",
            QueryError::MalformedSelection(_) => "malformed_selection",
            QueryError::Database(_) => "database",
            QueryError::PoolTimeout => "pool_timeout",
            QueryError::Decode { .. } => "decode",
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => QueryError::PoolTimeout,
            sqlx::Error::ColumnDecode { index, source } => QueryError::Decode {
                column: index,
                message: source.to_string(),
            },
            other => QueryError::Database(other),
        }
    }
}
