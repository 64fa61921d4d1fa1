//! History listing for account users.
//!
//! Reads only from the durable store. The fast store is a working copy of
//! the active conversation, not the record used for listings.

use std::sync::Arc;

use serde::Serialize;

use colloquy_types::chat::{ChatEntry, Session};
use colloquy_types::error::QueryError;
use colloquy_types::identity::Caller;
use uuid::Uuid;

use crate::store::DurableStore;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// One page of session listings, with the paging actually applied.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListing {
    pub sessions: Vec<Session>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

pub struct HistoryService<D: DurableStore> {
    durable: Arc<D>,
}

impl<D: DurableStore> HistoryService<D> {
    pub fn new(durable: Arc<D>) -> Self {
        Self { durable }
    }

    /// List the caller's sessions, most recently active first.
    pub async fn list_sessions(
        &self,
        caller: &Caller,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<SessionListing, QueryError> {
        let user_id = require_account(caller)?;
        let page = page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = clamp_limit(limit);
        let found = self.durable.list_sessions(user_id, page, limit).await?;
        Ok(SessionListing {
            sessions: found.sessions,
            total: found.total,
            page,
            limit,
        })
    }

    /// List the entries of one of the caller's sessions, oldest first.
    ///
    /// Without a positive `limit` the full history is returned.
    pub async fn list_messages(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<ChatEntry>, QueryError> {
        let user_id = require_account(caller)?;

        let session = self
            .durable
            .get_session(session_id)
            .await?
            .ok_or_else(|| QueryError::NotFound(format!("session {session_id} not found")))?;
        if !session.is_owned_by(Some(user_id)) {
            return Err(QueryError::Forbidden(
                "session belongs to another user".to_string(),
            ));
        }

        let entries = self
            .durable
            .list_entries(session_id, limit.filter(|&n| n > 0))
            .await?;
        Ok(entries)
    }
}

fn require_account(caller: &Caller) -> Result<&str, QueryError> {
    caller.user_id().ok_or_else(|| {
        QueryError::Forbidden("history is not available for visitors".to_string())
    })
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDurableStore, account_session, entry};
    use chrono::{Duration, Utc};
    use colloquy_types::chat::EntryType;

    fn service() -> (HistoryService<MemoryDurableStore>, Arc<MemoryDurableStore>) {
        let durable = Arc::new(MemoryDurableStore::default());
        (HistoryService::new(Arc::clone(&durable)), durable)
    }

    #[tokio::test]
    async fn test_guests_are_forbidden() {
        let (service, _) = service();
        let err = service
            .list_sessions(&Caller::guest(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Forbidden(_)));

        let err = service
            .list_messages(&Caller::guest(), &Uuid::now_v7(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_sessions_most_recent_first() {
        let (service, durable) = service();
        let mut older = account_session("u-1");
        older.last_active_at = Utc::now() - Duration::hours(2);
        let newer = account_session("u-1");
        let foreign = account_session("u-2");
        for s in [&older, &newer, &foreign] {
            durable.insert_session(s.clone());
        }

        let page = service
            .list_sessions(&Caller::account("u-1", "pro"), None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!((page.page, page.limit), (DEFAULT_PAGE, DEFAULT_LIMIT));
        let ids: Vec<_> = page.sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let second = service
            .list_sessions(&Caller::account("u-1", "pro"), Some(2), Some(1))
            .await
            .unwrap();
        assert_eq!(second.sessions.len(), 1);
        assert_eq!(second.sessions[0].id, older.id);
        assert_eq!((second.page, second.limit), (2, 1));
    }

    #[tokio::test]
    async fn test_list_messages_sorted_ascending() {
        let (service, durable) = service();
        let session = account_session("u-1");
        durable.insert_session(session.clone());

        let first = entry(session.id, EntryType::UserQuery, "q1");
        let second = entry(session.id, EntryType::GeneratedResponse, "a1");
        let third = entry(session.id, EntryType::UserQuery, "q2");
        // Inserted out of order on purpose.
        durable
            .upsert_entries(&[third.clone(), first.clone(), second.clone()])
            .await
            .unwrap();

        let entries = service
            .list_messages(&Caller::account("u-1", "pro"), &session.id, None)
            .await
            .unwrap();
        let contents: Vec<_> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2"]);
        assert!(entries.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert!(entries.iter().all(|e| e.durable));
    }

    #[tokio::test]
    async fn test_list_messages_checks_ownership() {
        let (service, durable) = service();
        let session = account_session("u-1");
        durable.insert_session(session.clone());

        let err = service
            .list_messages(&Caller::account("u-2", "pro"), &session.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Forbidden(_)));

        let err = service
            .list_messages(&Caller::account("u-1", "pro"), &Uuid::now_v7(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_messages_returns_full_history_by_default() {
        let (service, durable) = service();
        let session = account_session("u-1");
        durable.insert_session(session.clone());

        let base = Utc::now() - Duration::minutes(10);
        let entries: Vec<ChatEntry> = (0..30)
            .map(|i| {
                let mut e = entry(session.id, EntryType::UserQuery, &format!("m{i}"));
                e.created_at = base + Duration::seconds(i);
                e
            })
            .collect();
        durable.upsert_entries(&entries).await.unwrap();
        let caller = Caller::account("u-1", "pro");

        let all = service
            .list_messages(&caller, &session.id, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 30);
        assert_eq!(all.last().map(|e| e.content.as_str()), Some("m29"));

        let zero = service
            .list_messages(&caller, &session.id, Some(0))
            .await
            .unwrap();
        assert_eq!(zero.len(), 30);

        let capped = service
            .list_messages(&caller, &session.id, Some(5))
            .await
            .unwrap();
        let contents: Vec<_> = capped.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1_000)), MAX_LIMIT);
    }
}
