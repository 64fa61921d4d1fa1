//! Copies fast-store entries of account sessions into the durable store.
//!
//! The per-entry durability flag in the fast store is the only record of
//! what has been copied. A pass only ever sets flags after the durable
//! upsert reported success for that entry, so a failed or interrupted pass
//! is repaired by the next one.

use std::sync::Arc;

use colloquy_types::chat::ChatEntry;
use colloquy_types::error::RepositoryError;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{DurableStore, FastStore};

/// Totals for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub sessions_scanned: usize,
    pub entries_synced: usize,
    pub entries_failed: usize,
    /// Registry entries removed because the fast copy expired fully synced.
    pub sessions_retired: usize,
    /// Sessions skipped this pass because a store call failed.
    pub sessions_deferred: usize,
    pub expired_purged: u64,
}

#[derive(Debug, Default)]
struct SessionSync {
    synced: usize,
    failed: usize,
    retired: bool,
}

pub struct Reconciler<F: FastStore, D: DurableStore> {
    fast: Arc<F>,
    durable: Arc<D>,
}

impl<F: FastStore, D: DurableStore> Reconciler<F, D> {
    pub fn new(fast: Arc<F>, durable: Arc<D>) -> Self {
        Self { fast, durable }
    }

    /// Run a single pass over the owned-session registry.
    ///
    /// Only a failure to read the registry itself is an error; per-session
    /// failures are counted as deferred.
    #[tracing::instrument(name = "reconcile", skip_all)]
    pub async fn run_once(&self) -> Result<ReconcileReport, RepositoryError> {
        let session_ids = self.fast.owned_sessions().await?;
        let mut report = ReconcileReport {
            sessions_scanned: session_ids.len(),
            ..Default::default()
        };

        for session_id in session_ids {
            match self.reconcile_session(&session_id).await {
                Ok(sync) => {
                    report.entries_synced += sync.synced;
                    report.entries_failed += sync.failed;
                    if sync.retired {
                        report.sessions_retired += 1;
                    }
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "deferring session to next pass");
                    report.sessions_deferred += 1;
                }
            }
        }

        match self.fast.purge_expired().await {
            Ok(purged) => report.expired_purged = purged,
            Err(e) => warn!(error = %e, "failed to purge expired fast-store rows"),
        }

        info!(
            scanned = report.sessions_scanned,
            synced = report.entries_synced,
            failed = report.entries_failed,
            retired = report.sessions_retired,
            deferred = report.sessions_deferred,
            purged = report.expired_purged,
            "reconciliation pass complete"
        );
        Ok(report)
    }

    async fn reconcile_session(&self, session_id: &Uuid) -> Result<SessionSync, RepositoryError> {
        let session = self.fast.get_session(session_id).await?;
        let pending: Vec<ChatEntry> = self
            .fast
            .entries(session_id)
            .await?
            .into_iter()
            .filter(|entry| !entry.durable)
            .collect();

        if let Some(session) = &session {
            self.durable.upsert_session(session).await?;
        }

        let mut sync = SessionSync::default();
        if !pending.is_empty() {
            let report = self.durable.upsert_entries(&pending).await?;
            for (entry_id, error) in &report.failed {
                warn!(
                    session_id = %session_id,
                    entry_id = %entry_id,
                    error = %error,
                    "entry upsert failed, will retry"
                );
            }
            if !report.upserted.is_empty() {
                self.fast.mark_durable(session_id, &report.upserted).await?;
            }
            sync.synced = report.upserted.len();
            sync.failed = report.failed.len();
        }

        if session.is_none() && sync.failed == 0 {
            self.fast.unregister_owned(session_id).await?;
            debug!(session_id = %session_id, "fast copy expired, retired from registry");
            sync.retired = true;
        }

        Ok(sync)
    }
}
