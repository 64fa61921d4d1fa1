//! SQLite durable store implementation.
//!
//! Implements `DurableStore` from `colloquy-core`: the system of record for
//! account sessions and their entries. Raw queries, shared Row structs, and
//! split reader/writer pool usage.

use colloquy_core::store::{DurableStore, SessionPage, UpsertReport};
use colloquy_types::chat::{ChatEntry, Session};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{EntryRow, SessionRow, encode_sources, format_datetime, query_error};

/// SQLite-backed implementation of `DurableStore`.
#[derive(Clone)]
pub struct SqliteDurableStore {
    pool: DatabasePool,
}

impl SqliteDurableStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn entries_from_rows(
        rows: &[sqlx::sqlite::SqliteRow],
    ) -> Result<Vec<ChatEntry>, RepositoryError> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry_row =
                EntryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            entries.push(entry_row.into_entry(true)?);
        }
        Ok(entries)
    }
}

impl DurableStore for SqliteDurableStore {
    async fn upsert_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let Some(user_id) = session.user_id.as_deref() else {
            return Err(RepositoryError::Conflict(
                "guest sessions are never stored durably".to_string(),
            ));
        };

        // last_active_at only ever moves forward, even if an older copy
        // arrives late.
        sqlx::query(
            r#"INSERT INTO sessions (id, user_id, title, language, created_at, last_active_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   language = excluded.language,
                   last_active_at = MAX(sessions.last_active_at, excluded.last_active_at)"#,
        )
        .bind(session.id.to_string())
        .bind(user_id)
        .bind(&session.title)
        .bind(&session.language)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.last_active_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<SessionPage, RepositoryError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE user_id = ? ORDER BY last_active_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row =
                SessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            sessions.push(session_row.into_session()?);
        }

        Ok(SessionPage {
            sessions,
            total: total as u64,
        })
    }

    async fn list_entries(
        &self,
        session_id: &Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<ChatEntry>, RepositoryError> {
        // A negative LIMIT means no limit in SQLite.
        let rows = sqlx::query(
            "SELECT * FROM chat_entries WHERE session_id = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(session_id.to_string())
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Self::entries_from_rows(&rows)
    }

    async fn recent_entries(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ChatEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM chat_entries WHERE session_id = ?
                   ORDER BY created_at DESC, id DESC LIMIT ?
               ) ORDER BY created_at ASC, id ASC"#,
        )
        .bind(session_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Self::entries_from_rows(&rows)
    }

    async fn upsert_entries(&self, entries: &[ChatEntry]) -> Result<UpsertReport, RepositoryError> {
        let mut report = UpsertReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        // A failed statement does not abort the SQLite transaction, so one
        // bad row cannot take the rest of the batch down with it.
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        for entry in entries {
            let sources = match encode_sources(&entry.sources) {
                Ok(sources) => sources,
                Err(e) => {
                    report.failed.push((entry.id, e.to_string()));
                    continue;
                }
            };

            let result = sqlx::query(
                r#"INSERT INTO chat_entries (id, session_id, entry_type, content, sources, created_at)
                   VALUES (?, ?, ?, ?, ?, ?)
                   ON CONFLICT(id) DO UPDATE SET
                       content = excluded.content,
                       sources = excluded.sources"#,
            )
            .bind(entry.id.to_string())
            .bind(entry.session_id.to_string())
            .bind(entry.entry_type.to_string())
            .bind(&entry.content)
            .bind(sources)
            .bind(format_datetime(&entry.created_at))
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => report.upserted.push(entry.id),
                Err(e) => report.failed.push((entry.id, e.to_string())),
            }
        }
        tx.commit().await.map_err(query_error)?;

        Ok(report)
    }
}
