//! SQLite storage layer.
//!
//! Both stores are backed by SQLite with WAL mode and split read/write
//! connection pools: the durable store of record and the TTL-bearing fast
//! store. The row types here are shared by both.

pub mod durable;
pub mod fast;
pub mod pool;

use chrono::{DateTime, SecondsFormat, Utc};
use colloquy_types::chat::{ChatEntry, EntryType, Session, SourceCitation};
use colloquy_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Columns common to `sessions` and `fast_sessions`.
struct SessionRow {
    id: String,
    user_id: Option<String>,
    title: String,
    language: String,
    created_at: String,
    last_active_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            language: row.try_get("language")?,
            created_at: row.try_get("created_at")?,
            last_active_at: row.try_get("last_active_at")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))?;

        Ok(Session {
            id,
            is_guest: self.user_id.is_none(),
            user_id: self.user_id,
            title: self.title,
            language: self.language,
            created_at: parse_datetime(&self.created_at)?,
            last_active_at: parse_datetime(&self.last_active_at)?,
        })
    }
}

/// Columns common to `chat_entries` and `fast_entries`.
struct EntryRow {
    id: String,
    session_id: String,
    entry_type: String,
    content: String,
    sources: String,
    created_at: String,
}

impl EntryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            entry_type: row.try_get("entry_type")?,
            content: row.try_get("content")?,
            sources: row.try_get("sources")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_entry(self, durable: bool) -> Result<ChatEntry, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid entry id: {e}")))?;
        let session_id = Uuid::parse_str(&self.session_id)
            .map_err(|e| RepositoryError::Query(format!("invalid session_id: {e}")))?;
        let entry_type: EntryType = self
            .entry_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let sources: Vec<SourceCitation> = serde_json::from_str(&self.sources)
            .map_err(|e| RepositoryError::Query(format!("invalid sources json: {e}")))?;

        Ok(ChatEntry {
            id,
            session_id,
            entry_type,
            content: self.content,
            sources,
            created_at: parse_datetime(&self.created_at)?,
            durable,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 with microseconds, so text order is time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_sources(sources: &[SourceCitation]) -> Result<String, RepositoryError> {
    serde_json::to_string(sources)
        .map_err(|e| RepositoryError::Query(format!("failed to encode sources: {e}")))
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_datetime_is_fixed_width_and_ordered() {
        let a = DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + chrono::Duration::microseconds(1);
        let (fa, fb) = (format_datetime(&a), format_datetime(&b));
        assert_eq!(fa, "2026-10-18T12:00:00.000000Z");
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);
        assert_eq!(parse_datetime(&fb).unwrap(), b);
    }

    #[test]
    fn test_query_error_maps_pool_failures_to_connection() {
        assert!(matches!(
            query_error(sqlx::Error::PoolTimedOut),
            RepositoryError::Connection
        ));
        assert!(matches!(
            query_error(sqlx::Error::RowNotFound),
            RepositoryError::Query(_)
        ));
    }
}
