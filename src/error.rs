/// Typed errors surfaced by the query layer and mapped to HTTP statuses by
/// the endpoint.

use thiserror::Error;

/// A `start`/`end` parameter that is missing or not a `YYYY-MM-DD` date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedDateError {
    #[error("missing required query parameter `{0}` (expected YYYY-MM-DD)")]
    Missing(String),

    #[error("'{0}' is not a date in YYYY-MM-DD format")]
    BadFormat(String),

    #[error("'{0}' is not a valid calendar date")]
    InvalidDate(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    MalformedDate(#[from] MalformedDateError),

    #[error("data store unavailable: {0}")]
    DataStoreUnavailable(String),

    #[error("query exceeded the configured timeout")]
    QueryTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// The single HTTP status each error kind maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::MalformedDate(_) => 400,
            QueryError::DataStoreUnavailable(_) => 503,
            QueryError::QueryTimeout => 504,
            QueryError::Internal(_) => 500,
        }
    }

    /// Short machine-readable name, included in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::MalformedDate(_) => "malformed_date",
            QueryError::DataStoreUnavailable(_) => "data_store_unavailable",
            QueryError::QueryTimeout => "query_timeout",
            QueryError::Internal(_) => "internal",
        }
    }

    /// Message safe to hand to a client. Store and internal details stay in
    /// the log.
    pub fn client_message(&self) -> String {
        match self {
            QueryError::MalformedDate(e) => e.to_string(),
            QueryError::DataStoreUnavailable(_) => "data store unavailable".to_string(),
            QueryError::QueryTimeout => "query timed out".to_string(),
            QueryError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<postgres::Error> for QueryError {
    fn from(e: postgres::Error) -> Self {
        use postgres::error::SqlState;

        if e.code() == Some(&SqlState::QUERY_CANCELED) {
            QueryError::QueryTimeout
        } else if e.is_closed() || e.code() == Some(&SqlState::ADMIN_SHUTDOWN) || io_failure(&e) {
            QueryError::DataStoreUnavailable(e.to_string())
        } else {
            QueryError::Internal(e.to_string())
        }
    }
}

/// True when the error was caused by the socket rather than the server.
fn io_failure(e: &(dyn std::error::Error + 'static)) -> bool {
    std::error::Error::source(e).is_some_and(|source| source.is::<std::io::Error>())
}
