//! Session resolution across the fast and durable stores.
//!
//! The fast store is consulted first. Account sessions that have expired
//! from it are rehydrated from the durable store together with their most
//! recent entries, so a returning user keeps their history window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colloquy_types::chat::{Session, derive_title};
use colloquy_types::error::QueryError;
use colloquy_types::identity::Caller;
use colloquy_types::tier::TierParams;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{DurableStore, FastStore};

/// A session ready for the pipeline.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    /// True when the session was created by this request.
    pub is_new: bool,
}

/// Creates, loads, and refreshes sessions.
///
/// Generic over both stores so colloquy-core never depends on colloquy-infra.
pub struct SessionManager<F: FastStore, D: DurableStore> {
    fast: Arc<F>,
    durable: Arc<D>,
    ttl: Duration,
    hydrate_entries: usize,
}

impl<F: FastStore, D: DurableStore> SessionManager<F, D> {
    pub fn new(fast: Arc<F>, durable: Arc<D>, ttl: Duration, hydrate_entries: usize) -> Self {
        Self {
            fast,
            durable,
            ttl,
            hydrate_entries,
        }
    }

    pub fn fast(&self) -> &Arc<F> {
        &self.fast
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Find the caller's session or start a new one.
    ///
    /// A session belonging to someone else is treated exactly like a missing
    /// one. Identified callers get `NotFound` for ids that resolve nowhere;
    /// guests silently get a fresh session instead. Only sessions whose tier
    /// retains history are registered for durable persistence.
    pub async fn resolve(
        &self,
        existing: Option<Uuid>,
        caller: &Caller,
        tier: &TierParams,
        language: &str,
        first_message: &str,
    ) -> Result<ResolvedSession, QueryError> {
        if let Some(session_id) = existing {
            if let Some(session) = self.lookup(&session_id, caller, tier).await? {
                return Ok(ResolvedSession {
                    session,
                    is_new: false,
                });
            }

            if !caller.is_guest() {
                return Err(QueryError::NotFound(format!(
                    "session {session_id} not found"
                )));
            }
            debug!(session_id = %session_id, "unknown guest session, starting a fresh one");
        }

        let session = Session::new(caller.user_id.clone(), language, first_message);
        self.fast.put_session(&session, self.ttl).await?;
        if persists(&session, tier) {
            self.fast.register_owned(&session.id).await?;
        }

        info!(
            session_id = %session.id,
            guest = session.is_guest,
            "created session"
        );

        Ok(ResolvedSession {
            session,
            is_new: true,
        })
    }

    /// Record activity on a session after a successful exchange.
    ///
    /// Last-active time never moves backwards. An empty title is filled
    /// from `message`.
    pub async fn touch(
        &self,
        session: &mut Session,
        tier: &TierParams,
        message: &str,
    ) -> Result<(), QueryError> {
        let now = Utc::now();
        if now > session.last_active_at {
            session.last_active_at = now;
        }
        if session.title.is_empty() {
            session.title = derive_title(message);
        }

        self.fast.put_session(session, self.ttl).await?;
        if persists(session, tier) {
            self.fast.register_owned(&session.id).await?;
        }
        Ok(())
    }

    async fn lookup(
        &self,
        session_id: &Uuid,
        caller: &Caller,
        tier: &TierParams,
    ) -> Result<Option<Session>, QueryError> {
        if let Some(session) = self.fast.get_session(session_id).await? {
            if !session.is_owned_by(caller.user_id()) {
                debug!(session_id = %session_id, "session belongs to another caller");
                return Ok(None);
            }
            self.fast.put_session(&session, self.ttl).await?;
            return Ok(Some(session));
        }

        let Some(user_id) = caller.user_id() else {
            return Ok(None);
        };

        match self.durable.get_session(session_id).await? {
            Some(session) if session.is_owned_by(Some(user_id)) => {
                self.rehydrate(&session, tier).await?;
                Ok(Some(session))
            }
            Some(_) => {
                debug!(session_id = %session_id, "durable session belongs to another caller");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Copy a durable session and its recent entries back into the fast store.
    async fn rehydrate(&self, session: &Session, tier: &TierParams) -> Result<(), QueryError> {
        let limit = u32::try_from(self.hydrate_entries).unwrap_or(u32::MAX);
        let mut entries = self.durable.recent_entries(&session.id, limit).await?;
        for entry in &mut entries {
            entry.durable = true;
        }

        self.fast.put_session(session, self.ttl).await?;
        if !entries.is_empty() {
            self.fast
                .append_entries(&session.id, &entries, self.ttl)
                .await?;
        }
        if persists(session, tier) {
            self.fast.register_owned(&session.id).await?;
        }

        info!(
            session_id = %session.id,
            entries = entries.len(),
            "rehydrated session from durable store"
        );
        Ok(())
    }
}

/// Whether a session's entries should reach the durable store.
fn persists(session: &Session, tier: &TierParams) -> bool {
    !session.is_guest && tier.retain_history
}
