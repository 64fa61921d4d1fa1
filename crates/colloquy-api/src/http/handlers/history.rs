//! History HTTP handlers (account users only).
//!
//! Endpoints:
//! - GET /api/v1/chats/sessions               - List the caller's sessions
//! - GET /api/v1/chats/sessions/{id}/messages - Entries of one session

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use colloquy_core::query::SessionListing;
use colloquy_types::chat::ChatEntry;

use crate::http::error::AppError;
use crate::http::extractors::identity::Identity;
use crate::http::extractors::query::{LimitQuery, PageQuery};
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid session id: {s}")))
}

/// GET /api/v1/chats/sessions - List sessions, most recently active first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<SessionListing>>, AppError> {
    let start = Instant::now();
    let listing = state
        .history
        .list_sessions(&caller, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(listing, start)))
}

/// GET /api/v1/chats/sessions/{id}/messages - Entries oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(session_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<ChatEntry>>>, AppError> {
    let start = Instant::now();
    let session_id = parse_uuid(&session_id)?;
    let entries = state
        .history
        .list_messages(&caller, &session_id, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(entries, start)))
}
