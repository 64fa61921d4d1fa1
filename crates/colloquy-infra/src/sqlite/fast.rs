//! SQLite fast store implementation.
//!
//! Implements `FastStore` from `colloquy-core`. Every row carries an
//! `expires_at` in unix milliseconds; reads filter on it and
//! [`purge_expired`](FastStore::purge_expired) deletes what is left behind.

use std::time::Duration;

use chrono::Utc;
use colloquy_core::store::FastStore;
use colloquy_types::chat::{ChatEntry, Session};
use colloquy_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{EntryRow, SessionRow, encode_sources, format_datetime, query_error};

/// SQLite-backed implementation of `FastStore`.
#[derive(Clone)]
pub struct SqliteFastStore {
    pool: DatabasePool,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry(ttl: Duration) -> i64 {
    now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

impl SqliteFastStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn entries_from_rows(
        rows: &[sqlx::sqlite::SqliteRow],
    ) -> Result<Vec<ChatEntry>, RepositoryError> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let durable: i64 = row
                .try_get("durable")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let entry_row =
                EntryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            entries.push(entry_row.into_entry(durable != 0)?);
        }
        Ok(entries)
    }
}

impl FastStore for SqliteFastStore {
    async fn put_session(&self, session: &Session, ttl: Duration) -> Result<(), RepositoryError> {
        let expires_at = expiry(ttl);
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        sqlx::query(
            r#"INSERT INTO fast_sessions (id, user_id, title, language, created_at, last_active_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   user_id = excluded.user_id,
                   title = excluded.title,
                   language = excluded.language,
                   last_active_at = excluded.last_active_at,
                   expires_at = excluded.expires_at"#,
        )
        .bind(session.id.to_string())
        .bind(session.user_id.as_deref())
        .bind(&session.title)
        .bind(&session.language)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.last_active_at))
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        // Entries live exactly as long as their session.
        sqlx::query("UPDATE fast_entries SET expires_at = ? WHERE session_id = ? AND expires_at > ?")
            .bind(expires_at)
            .bind(session.id.to_string())
            .bind(now_millis())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM fast_sessions WHERE id = ? AND expires_at > ?")
            .bind(session_id.to_string())
            .bind(now_millis())
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

    async fn append_entries(
        &self,
        session_id: &Uuid,
        entries: &[ChatEntry],
        ttl: Duration,
    ) -> Result<(), RepositoryError> {
        let now = now_millis();
        let expires_at = expiry(ttl);
        let session_key = session_id.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        // Expired leftovers must not resurface once the TTL is refreshed.
        sqlx::query("DELETE FROM fast_entries WHERE session_id = ? AND expires_at <= ?")
            .bind(&session_key)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        for entry in entries {
            sqlx::query(
                r#"INSERT INTO fast_entries
                       (id, session_id, entry_type, content, sources, created_at, durable, expires_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(id) DO UPDATE SET
                       content = excluded.content,
                       sources = excluded.sources,
                       durable = MAX(fast_entries.durable, excluded.durable),
                       expires_at = excluded.expires_at"#,
            )
            .bind(entry.id.to_string())
            .bind(&session_key)
            .bind(entry.entry_type.to_string())
            .bind(&entry.content)
            .bind(encode_sources(&entry.sources)?)
            .bind(format_datetime(&entry.created_at))
            .bind(i64::from(entry.durable))
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        sqlx::query("UPDATE fast_entries SET expires_at = ? WHERE session_id = ?")
            .bind(expires_at)
            .bind(&session_key)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn recent_entries(
        &self,
        session_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<ChatEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM fast_entries WHERE session_id = ? AND expires_at > ?
                   ORDER BY seq DESC LIMIT ?
               ) ORDER BY seq ASC"#,
        )
        .bind(session_id.to_string())
        .bind(now_millis())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Self::entries_from_rows(&rows)
    }

    async fn entries(&self, session_id: &Uuid) -> Result<Vec<ChatEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM fast_entries WHERE session_id = ? AND expires_at > ? ORDER BY seq ASC",
        )
        .bind(session_id.to_string())
        .bind(now_millis())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Self::entries_from_rows(&rows)
    }

    async fn mark_durable(
        &self,
        session_id: &Uuid,
        entry_ids: &[Uuid],
    ) -> Result<u64, RepositoryError> {
        if entry_ids.is_empty() {
            return Ok(0);
        }

        let session_key = session_id.to_string();
        let mut changed = 0;
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        for id in entry_ids {
            let result = sqlx::query(
                "UPDATE fast_entries SET durable = 1 WHERE id = ? AND session_id = ? AND durable = 0",
            )
            .bind(id.to_string())
            .bind(&session_key)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
            changed += result.rows_affected();
        }
        tx.commit().await.map_err(query_error)?;

        Ok(changed)
    }

    async fn register_owned(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO owned_sessions (session_id, registered_at) VALUES (?, ?) ON CONFLICT(session_id) DO NOTHING",
        )
        .bind(session_id.to_string())
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn unregister_owned(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM owned_sessions WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn owned_sessions(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT session_id FROM owned_sessions ORDER BY registered_at ASC")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_error)?;

        rows.into_iter()
            .map(|(id,)| {
                Uuid::parse_str(&id)
                    .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))
            })
            .collect()
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let now = now_millis();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let entries = sqlx::query("DELETE FROM fast_entries WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        let sessions = sqlx::query("DELETE FROM fast_sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(entries.rows_affected() + sessions.rows_affected())
    }
}
