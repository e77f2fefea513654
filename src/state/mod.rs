pub mod clock;
pub mod mutation;
mod player_map;
pub mod roster;
pub mod save_status;
pub mod schedule;
pub mod settings;
mod sse;
pub mod stats;
pub mod tournament;

use std::sync::{
    Arc, Mutex as StdMutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};

use crate::{
    config::AppConfig,
    dao::{document_store::DocumentStore, local_cache::LocalCache},
    error::ServiceError,
    services::sse_events,
    state::{
        save_status::SaveStatus,
        tournament::{Timestamp, TournamentDocument, now_millis},
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Background tasks owned by the synchronization controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSlot {
    /// Pending debounced flush.
    Debounce,
    /// "saved" indicator expiry.
    Revert,
    /// Scheduled retry of a failed write.
    Retry,
    /// Clock ticker.
    Ticker,
    /// Forwarder of store change notifications.
    Subscription,
}

#[derive(Default)]
struct TaskHandles {
    debounce: Option<JoinHandle<()>>,
    revert: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    subscription: Option<JoinHandle<()>>,
}

impl TaskHandles {
    fn slot(&mut self, slot: TaskSlot) -> &mut Option<JoinHandle<()>> {
        match slot {
            TaskSlot::Debounce => &mut self.debounce,
            TaskSlot::Revert => &mut self.revert,
            TaskSlot::Retry => &mut self.retry,
            TaskSlot::Ticker => &mut self.ticker,
            TaskSlot::Subscription => &mut self.subscription,
        }
    }
}

/// Central application state: the canonical tournament document, the store
/// handle and the channels observers listen on.
pub struct AppState {
    config: AppConfig,
    cache: LocalCache,
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    sse: SseHub,
    document: RwLock<TournamentDocument>,
    save_status: watch::Sender<SaveStatus>,
    write_gate: Mutex<()>,
    local_revision: AtomicU64,
    tasks: StdMutex<TaskHandles>,
    disposed: AtomicBool,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed, holding a fresh document built from the configured template.
    pub fn new(config: AppConfig, cache: LocalCache) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (status_tx, _rx) = watch::channel(SaveStatus::Idle);
        let document = TournamentDocument::from_template(&config.template, now_millis());
        let revision = document.last_updated;
        Arc::new(Self {
            config,
            cache,
            store: RwLock::new(None),
            degraded: degraded_tx,
            sse: SseHub::new(SSE_CAPACITY),
            document: RwLock::new(document),
            save_status: status_tx,
            write_gate: Mutex::new(()),
            local_revision: AtomicU64::new(revision),
            tasks: StdMutex::new(TaskHandles::default()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Settings loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Device-local snapshot cache.
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new document store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current document store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when it changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
        if changed {
            sse_events::broadcast_system_status(&self.sse, value);
        }
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Copy of the canonical document.
    pub async fn document(&self) -> TournamentDocument {
        self.document.read().await.clone()
    }

    /// Lock guarding the canonical document. Only the sync controller writes through it.
    pub(crate) fn document_lock(&self) -> &RwLock<TournamentDocument> {
        &self.document
    }

    /// Current persistence status.
    pub fn save_status(&self) -> SaveStatus {
        *self.save_status.borrow()
    }

    /// Subscribe to save status updates.
    pub fn save_status_watcher(&self) -> watch::Receiver<SaveStatus> {
        self.save_status.subscribe()
    }

    pub(crate) fn save_status_sender(&self) -> &watch::Sender<SaveStatus> {
        &self.save_status
    }

    /// Serializes writes to the store.
    pub(crate) fn write_gate(&self) -> &Mutex<()> {
        &self.write_gate
    }

    /// `last_updated` of the newest local change. A write older than this
    /// leaves a change unsaved.
    pub(crate) fn local_revision(&self) -> Timestamp {
        self.local_revision.load(Ordering::SeqCst)
    }

    pub(crate) fn note_local_change(&self, stamp: Timestamp) {
        self.local_revision.fetch_max(stamp, Ordering::SeqCst);
    }

    /// Restart revision tracking after the canonical document was replaced
    /// by another tournament.
    pub(crate) fn reset_local_revision(&self, stamp: Timestamp) {
        self.local_revision.store(stamp, Ordering::SeqCst);
    }

    fn with_tasks<T>(&self, f: impl FnOnce(&mut TaskHandles) -> T) -> T {
        let mut guard = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Store `handle` in `slot`, aborting whatever ran there before.
    ///
    /// Once the state is disposed new tasks are aborted immediately.
    pub(crate) fn replace_task(&self, slot: TaskSlot, handle: JoinHandle<()>) {
        if self.is_disposed() {
            handle.abort();
            return;
        }
        let previous = self.with_tasks(|tasks| tasks.slot(slot).replace(handle));
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Abort the task in `slot`, if any.
    pub(crate) fn abort_task(&self, slot: TaskSlot) {
        if let Some(handle) = self.with_tasks(|tasks| tasks.slot(slot).take()) {
            handle.abort();
        }
    }

    /// Whether a live task occupies `slot`.
    pub fn has_task(&self, slot: TaskSlot) -> bool {
        self.with_tasks(|tasks| {
            tasks
                .slot(slot)
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
        })
    }

    /// Whether the owned tasks were torn down.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Mark the state disposed and abort every owned task.
    pub(crate) fn dispose_tasks(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        for slot in [
            TaskSlot::Debounce,
            TaskSlot::Revert,
            TaskSlot::Retry,
            TaskSlot::Ticker,
            TaskSlot::Subscription,
        ] {
            self.abort_task(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::document_store::memory::MemoryDocumentStore;

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), LocalCache::in_memory())
    }

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = state();
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(state.require_store().await.is_err());

        state
            .install_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn replacing_a_task_aborts_the_previous_one() {
        let state = state();
        state.replace_task(
            TaskSlot::Debounce,
            tokio::spawn(tokio::time::sleep(Duration::from_secs(60))),
        );
        assert!(state.has_task(TaskSlot::Debounce));

        state.replace_task(TaskSlot::Debounce, tokio::spawn(async {}));
        state.dispose_tasks();
        assert!(!state.has_task(TaskSlot::Debounce));

        state.replace_task(
            TaskSlot::Retry,
            tokio::spawn(tokio::time::sleep(Duration::from_secs(60))),
        );
        assert!(!state.has_task(TaskSlot::Retry));
    }

    #[test]
    fn fresh_state_holds_the_template_document() {
        let state = state();
        let document = state.document.try_read().unwrap().clone();
        assert_eq!(document.schedule.len(), state.config().template.schedule.len());
        assert_eq!(state.save_status(), SaveStatus::Idle);
    }
}
