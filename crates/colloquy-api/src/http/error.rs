//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use colloquy_types::error::QueryError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Engine errors.
    Query(QueryError),
    /// Malformed request that never reached the engine.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::Query(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Query(e) => {
                let status = match e {
                    QueryError::Validation(_) => StatusCode::BAD_REQUEST,
                    QueryError::Forbidden(_) => StatusCode::FORBIDDEN,
                    QueryError::NotFound(_) => StatusCode::NOT_FOUND,
                    QueryError::Upstream(_) => StatusCode::BAD_GATEWAY,
                    // The client went away; nobody reads this.
                    QueryError::Cancelled => StatusCode::REQUEST_TIMEOUT,
                    QueryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code(), e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string(), 0);
        (status, body).into_response()
    }
}
