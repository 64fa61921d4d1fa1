//! FastStore trait definition.
//!
//! The fast store holds the working copy of active conversations. Every
//! session and entry carries a time-to-live; expired rows are invisible to
//! reads and eventually purged. It also holds the registry of session ids
//! that have an identified owner, which the reconciler walks.

use std::time::Duration;

use colloquy_types::chat::{ChatEntry, Session};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Low-latency, TTL-bearing store for live sessions and their entries.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in colloquy-infra.
pub trait FastStore: Send + Sync {
    /// Insert or replace a session and reset its TTL.
    fn put_session(
        &self,
        session: &Session,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a live session. Expired sessions read as `None`.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Append entries in the given order, atomically, and reset the TTL of
    /// the owning session's entries.
    ///
    /// Entries may carry `durable = true` (rehydrated from the durable store).
    fn append_entries(
        &self,
        session_id: &Uuid,
        entries: &[ChatEntry],
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The last `limit` live entries of a session, oldest first.
    fn recent_entries(
        &self,
        session_id: &Uuid,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send;

    /// All live entries of a session in append order.
    fn entries(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send;

    /// Set the durability flag on the given entries. Never clears it.
    ///
    /// Returns the number of entries that changed.
    fn mark_durable(
        &self,
        session_id: &Uuid,
        entry_ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Add a session id to the owned-session registry (set semantics).
    fn register_owned(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a session id from the owned-session registry.
    fn unregister_owned(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Every id currently in the owned-session registry.
    fn owned_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Uuid>, RepositoryError>> + Send;

    /// Physically delete expired sessions and entries. Returns rows removed.
    fn purge_expired(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
