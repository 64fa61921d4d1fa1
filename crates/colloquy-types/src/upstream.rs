//! Request/response shapes for the retrieval and generation collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::SourceCitation;

/// Ranked passages returned by the retrieval service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub results: Vec<SourceCitation>,
    #[serde(default)]
    pub message: String,
}

/// Speaker of a history turn, in the generation service's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Model => write!(f, "model"),
        }
    }
}

/// A prior message replayed to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// Word ceiling communicated to the model; the orchestrator enforces it too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_words: Option<usize>,
}

impl GenerationRequest {
    pub fn one_shot(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            max_words: None,
        }
    }
}

/// Item of a streaming generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    Chunk(String),
    Done,
}
