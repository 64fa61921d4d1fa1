//! DurableStore trait definition.
//!
//! The durable store is the system of record for account sessions and their
//! history. The live pipeline never writes to it directly; the reconciler
//! copies fast-store rows here.

use colloquy_types::chat::{ChatEntry, Session};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// One page of a user's sessions, most recently active first.
#[derive(Debug, Clone, Default)]
pub struct SessionPage {
    pub sessions: Vec<Session>,
    /// Sessions the user owns across all pages.
    pub total: u64,
}

/// Per-entry result of a bulk upsert.
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    pub upserted: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

/// Repository trait for long-term session and entry persistence.
///
/// Implementations live in colloquy-infra (e.g., `SqliteDurableStore`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait DurableStore: Send + Sync {
    /// Insert or update a session keyed by id.
    fn upsert_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Sessions owned by `user_id`, ordered by last_active_at DESC.
    ///
    /// `page` is 1-based.
    fn list_sessions(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<SessionPage, RepositoryError>> + Send;

    /// Entries of a session ordered by created_at ASC. `None` returns the
    /// whole history, `Some(n)` the first `n` entries.
    fn list_entries(
        &self,
        session_id: &Uuid,
        limit: Option<u32>,
    ) -> impl std::future::Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send;

    /// The last `limit` entries of a session, oldest first.
    fn recent_entries(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send;

    /// Upsert entries keyed by id. Safe to repeat.
    ///
    /// A failure to reach the store at all is an `Err`; individual rows that
    /// fail are reported in [`UpsertReport::failed`] without aborting the rest.
    fn upsert_entries(
        &self,
        entries: &[ChatEntry],
    ) -> impl std::future::Future<Output = Result<UpsertReport, RepositoryError>> + Send;
}
