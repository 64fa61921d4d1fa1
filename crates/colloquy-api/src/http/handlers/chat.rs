//! SSE query endpoint.
//!
//! POST /api/v1/chats/query
//!
//! Validation and session lookup happen before the stream opens, so those
//! failures come back as ordinary JSON errors. After that every outcome is
//! an SSE event:
//! - `session_id` -- `{ "id": "..." }`, first and only for new sessions
//! - `message` -- `{ "text": "...", "sources"?: [...] }`
//! - `complete` -- `{ "is_complete": true, "suggested_questions"?: [...] }`
//! - `error` -- `{ "code": "...", "message": "..." }`
//!
//! Dropping the response stream (client disconnect) cancels the query.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use colloquy_types::query::{QueryEvent, QueryRequest};

use crate::http::error::AppError;
use crate::http::extractors::identity::{Identity, session_cookie, session_cookie_header};
use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Request body for the query endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody {
    /// Session to continue. Guests may omit it and rely on the cookie.
    #[serde(default)]
    pub session_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
}

fn sse_event(event: &QueryEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

/// POST /api/v1/chats/query - answer a question as an SSE stream.
pub async fn post_query(
    State(state): State<AppState>,
    Identity(caller): Identity,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
) -> Result<Response, AppError> {
    let session_id = body
        .session_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| caller.is_guest().then(|| session_cookie(&headers)).flatten());
    let is_guest = caller.is_guest();

    let request = QueryRequest {
        caller,
        session_id,
        message: body.query,
        language: body.language.unwrap_or_default(),
    };

    let cancel = CancellationToken::new();
    let handle = state.orchestrator.start(request, cancel.clone()).await?;
    tracing::debug!(
        session_id = %handle.session.id,
        is_new = handle.is_new,
        tier = %handle.tier.tier,
        "query accepted"
    );

    let set_cookie = if handle.is_new && is_guest {
        let value = session_cookie_header(
            &handle.session.id.to_string(),
            state.config.guest_cookie_max_age_secs,
        );
        Some(
            HeaderValue::from_str(&value)
                .map_err(|e| AppError::Internal(format!("invalid cookie value: {e}")))?,
        )
    } else {
        None
    };

    let mut events = handle.events;
    let guard = cancel.drop_guard();
    let stream = async_stream::stream! {
        // Cancels the query if the client disconnects mid-stream.
        let _guard = guard;
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(sse_event(&event));
            if terminal {
                break;
            }
        }
    };

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response();
    if let Some(cookie) = set_cookie {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_body_uses_camel_case() {
        let body: QueryBody = serde_json::from_str(
            r#"{"sessionId": "0192f0c4-0000-7000-8000-000000000000", "query": "hi", "language": "am"}"#,
        )
        .unwrap();
        assert!(body.session_id.is_some());
        assert_eq!(body.query, "hi");
        assert_eq!(body.language.as_deref(), Some("am"));

        let minimal: QueryBody = serde_json::from_str(r#"{"query": "hi"}"#).unwrap();
        assert!(minimal.session_id.is_none());
        assert!(minimal.language.is_none());
    }
}
