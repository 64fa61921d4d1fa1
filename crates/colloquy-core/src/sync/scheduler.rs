//! Fixed-interval driver for the reconciler.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::reconciler::Reconciler;
use crate::store::{DurableStore, FastStore};

/// Runs [`Reconciler::run_once`] every `interval` until cancelled.
///
/// A pass that is already running when the token fires completes first;
/// passes are idempotent, so an interrupted shutdown loses nothing.
pub struct ReconciliationScheduler<F: FastStore, D: DurableStore> {
    reconciler: Arc<Reconciler<F, D>>,
    interval: Duration,
}

impl<F, D> ReconciliationScheduler<F, D>
where
    F: FastStore + 'static,
    D: DurableStore + 'static,
{
    pub fn new(reconciler: Arc<Reconciler<F, D>>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "reconciliation scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reconciler.run_once().await {
                        warn!(error = %e, "reconciliation pass failed, retrying next interval");
                    }
                }
            }
        }

        info!("reconciliation scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDurableStore, MemoryFastStore, account_session, entry};
    use colloquy_types::chat::EntryType;

    #[tokio::test]
    async fn test_scheduler_syncs_and_stops_on_cancel() {
        let fast = Arc::new(MemoryFastStore::default());
        let durable = Arc::new(MemoryDurableStore::default());
        let ttl = Duration::from_secs(60);

        let session = account_session("u-1");
        fast.put_session(&session, ttl).await.unwrap();
        fast.register_owned(&session.id).await.unwrap();
        fast.append_entries(
            &session.id,
            &[entry(session.id, EntryType::UserQuery, "q")],
            ttl,
        )
        .await
        .unwrap();

        let reconciler = Arc::new(Reconciler::new(Arc::clone(&fast), Arc::clone(&durable)));
        let cancel = CancellationToken::new();
        let handle =
            ReconciliationScheduler::new(reconciler, Duration::from_millis(10)).spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert_eq!(durable.entry_count(), 1);
        assert!(fast.entries(&session.id).await.unwrap()[0].durable);
    }
}
