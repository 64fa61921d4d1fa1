use thiserror::Error;

/// Errors from repository operations (used by the store traits in colloquy-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the retrieval service.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval request failed: {0}")]
    Transport(String),

    #[error("retrieval service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode retrieval response: {0}")]
    Decode(String),
}

/// Errors from the generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("rate limited")]
    RateLimited,

    #[error("stream error: {0}")]
    Stream(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("empty response from model")]
    EmptyResponse,
}

/// Failure taxonomy of the query engine.
///
/// `Cancelled` is a terminal state rather than a fault; callers log it at
/// info level and never report it as an error.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("store failure: {0}")]
    Store(#[from] RepositoryError),

    #[error("request cancelled")]
    Cancelled,
}

impl QueryError {
    /// Stable machine-readable code, used in error events and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "VALIDATION_ERROR",
            QueryError::Upstream(_) => "UPSTREAM_ERROR",
            QueryError::NotFound(_) => "NOT_FOUND",
            QueryError::Forbidden(_) => "FORBIDDEN",
            QueryError::Store(_) => "STORE_ERROR",
            QueryError::Cancelled => "CANCELLED",
        }
    }
}

impl From<RetrievalError> for QueryError {
    fn from(e: RetrievalError) -> Self {
        QueryError::Upstream(e.to_string())
    }
}

impl From<GenerationError> for QueryError {
    fn from(e: GenerationError) -> Self {
        QueryError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_upstream_errors_map_to_upstream() {
        let err: QueryError = RetrievalError::Status {
            status: 503,
            body: "down".to_string(),
        }
        .into();
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        assert!(err.to_string().contains("503"));

        let err: QueryError = GenerationError::RateLimited.into();
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn test_store_error_from_repository() {
        let err: QueryError = RepositoryError::Connection.into();
        assert_eq!(err.code(), "STORE_ERROR");
    }
}
