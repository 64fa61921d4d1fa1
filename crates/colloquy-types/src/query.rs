//! Inbound query requests and the typed events streamed back for them.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::chat::SourceCitation;
use crate::identity::Caller;

/// One user message handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub caller: Caller,
    /// Raw session id as supplied by the client; validated by the orchestrator.
    pub session_id: Option<String>,
    pub message: String,
    pub language: String,
}

/// An event on the outbound stream of a query.
///
/// Ordering guarantees: `SessionId` comes first and at most once, `Message`
/// zero or more times, then exactly one of `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    SessionId {
        id: Uuid,
    },
    Message {
        text: String,
        sources: Vec<SourceCitation>,
    },
    Complete {
        suggested_questions: Vec<String>,
        text: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
}

impl QueryEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            QueryEvent::SessionId { .. } => "session_id",
            QueryEvent::Message { .. } => "message",
            QueryEvent::Complete { .. } => "complete",
            QueryEvent::Error { .. } => "error",
        }
    }

    /// JSON payload carried in the SSE `data` field.
    pub fn payload(&self) -> Value {
        match self {
            QueryEvent::SessionId { id } => json!({ "id": id }),
            QueryEvent::Message { text, sources } => {
                let mut data = json!({ "text": text });
                if !sources.is_empty() {
                    data["sources"] = json!(sources);
                }
                data
            }
            QueryEvent::Complete {
                suggested_questions,
                text,
            } => {
                let mut data = json!({ "is_complete": true });
                if !suggested_questions.is_empty() {
                    data["suggested_questions"] = json!(suggested_questions);
                }
                if let Some(text) = text.as_ref().filter(|t| !t.is_empty()) {
                    data["text"] = json!(text);
                }
                data
            }
            QueryEvent::Error { code, message } => json!({ "code": code, "message": message }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryEvent::Complete { .. } | QueryEvent::Error { .. })
    }
}

/// How a query pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl QueryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Completed => "completed",
            QueryOutcome::Failed => "failed",
            QueryOutcome::Cancelled => "cancelled",
        }
    }
}
