//! Chat session, entry, and citation types for Colloquy.
//!
//! A [`Session`] is one conversation. Each turn is recorded as a pair of
//! [`ChatEntry`] values (the user query and the generated response), which
//! live in the fast store first and are copied to the durable store by the
//! reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Longest title derived from a first message, in characters.
pub const MAX_TITLE_CHARS: usize = 60;

/// A single conversation.
///
/// Guest sessions have no `user_id` and never enter the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Owning account, `None` for guests.
    pub user_id: Option<String>,
    pub title: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub is_guest: bool,
}

impl Session {
    /// Start a new session for the given owner.
    pub fn new(user_id: Option<String>, language: &str, first_message: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            is_guest: user_id.is_none(),
            user_id,
            title: derive_title(first_message),
            language: language.to_string(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Whether `user_id` may read or write this session.
    ///
    /// Guest sessions are addressable by anyone holding the id; account
    /// sessions only by their owner.
    pub fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        match (&self.user_id, user_id) {
            (None, None) => true,
            (Some(owner), Some(caller)) => owner == caller,
            _ => false,
        }
    }
}

/// Build a display title from the first message of a conversation.
///
/// Cuts at the last word boundary inside [`MAX_TITLE_CHARS`] and appends an
/// ellipsis when anything was dropped.
pub fn derive_title(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return collapsed;
    }

    let mut title = String::new();
    for word in collapsed.split(' ') {
        let extra = if title.is_empty() { 0 } else { 1 };
        if title.chars().count() + extra + word.chars().count() > MAX_TITLE_CHARS {
            break;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(word);
    }
    if title.is_empty() {
        // A single word longer than the limit.
        title = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    }
    title.push_str("...");
    title
}

/// Kind of chat entry.
///
/// Maps to the CHECK constraint in both SQLite schemas:
/// `CHECK (entry_type IN ('user_query', 'generated_response', 'summary'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    UserQuery,
    GeneratedResponse,
    Summary,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::UserQuery => write!(f, "user_query"),
            EntryType::GeneratedResponse => write!(f, "generated_response"),
            EntryType::Summary => write!(f, "summary"),
        }
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user_query" => Ok(EntryType::UserQuery),
            "generated_response" => Ok(EntryType::GeneratedResponse),
            "summary" => Ok(EntryType::Summary),
            other => Err(format!("invalid entry type: '{other}'")),
        }
    }
}

/// A passage the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub content: String,
    pub source: String,
    pub article_number: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

/// One turn in a conversation.
///
/// Entries of a session are ordered by `created_at`. `durable` flips from
/// false to true once the reconciler has copied the entry, and never back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceCitation>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub durable: bool,
}

impl ChatEntry {
    pub fn new(
        session_id: Uuid,
        entry_type: EntryType,
        content: impl Into<String>,
        sources: Vec<SourceCitation>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            entry_type,
            content: content.into(),
            sources,
            created_at,
            durable: false,
        }
    }
}
