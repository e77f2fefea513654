//! Change detection for backends without push notifications.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::storage::StorageResult,
    state::tournament::{Timestamp, TournamentDocument},
};

/// Interval between two reads of the active document.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One read of the active document.
pub type FetchFuture = BoxFuture<'static, StorageResult<Option<TournamentDocument>>>;
/// Reads the active document on behalf of the poller.
pub type FetchActive = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Periodically reads the active document and broadcasts it when its id or
/// logical timestamp moved.
pub struct ChangePoller {
    sender: broadcast::Sender<TournamentDocument>,
    task: Mutex<Option<JoinHandle<()>>>,
    period: Duration,
}

impl ChangePoller {
    /// Create an idle poller; nothing runs until [`start`](Self::start).
    pub fn new(capacity: usize, period: Duration) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
            task: Mutex::new(None),
            period,
        }
    }

    /// Register a new change subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<TournamentDocument> {
        self.sender.subscribe()
    }

    /// Spawn the polling loop unless it already runs.
    ///
    /// `fetch` must not hold a strong reference to whatever owns the poller.
    pub async fn start(&self, fetch: FetchActive) {
        let mut guard = self.task.lock().await;
        if guard.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let sender = self.sender.clone();
        let period = self.period;
        *guard = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut baseline: Option<Option<(Uuid, Timestamp)>> = None;

            loop {
                ticker.tick().await;
                let document = match fetch().await {
                    Ok(document) => document,
                    Err(err) => {
                        warn!(error = %err, "change poll failed");
                        continue;
                    }
                };

                let seen = document.as_ref().map(|doc| (doc.id, doc.last_updated));
                let previous = baseline.replace(seen);
                if previous.is_none() || previous == Some(seen) {
                    continue;
                }
                if let Some(document) = document {
                    debug!(
                        tournament_id = %document.id,
                        last_updated = document.last_updated,
                        "remote tournament change detected"
                    );
                    let _ = sender.send(document);
                }
            }
        }));
    }
}

impl Drop for ChangePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::state::tournament::TournamentTemplate;

    #[tokio::test(start_paused = true)]
    async fn broadcasts_only_when_timestamp_moves() {
        let base = TournamentDocument::from_template(&TournamentTemplate::default(), 100);
        let stamp = Arc::new(AtomicU64::new(100));

        let fetch: FetchActive = {
            let stamp = stamp.clone();
            Arc::new(move || -> FetchFuture {
                let mut document = base.clone();
                document.last_updated = stamp.load(Ordering::SeqCst);
                Box::pin(async move { Ok(Some(document)) })
            })
        };

        let poller = ChangePoller::new(8, POLL_INTERVAL);
        let mut changes = poller.subscribe();
        poller.start(fetch).await;

        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert!(changes.try_recv().is_err());

        stamp.store(250, Ordering::SeqCst);
        tokio::time::sleep(POLL_INTERVAL + Duration::from_millis(10)).await;
        let change = changes.recv().await.unwrap();
        assert_eq!(change.last_updated, 250);

        tokio::time::sleep(POLL_INTERVAL * 2).await;
        assert!(changes.try_recv().is_err());
    }
}
