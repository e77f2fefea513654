//! In-process document store.
//!
//! Used when no remote backend is configured and as the test double for the
//! synchronization controller. Clones share the same storage, so several
//! controllers can observe each other through one store.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::{
    dao::{
        document_store::DocumentStore,
        models::{TournamentEnvelope, TournamentListItem, sort_newest_first},
        storage::{StorageError, StorageResult},
    },
    state::tournament::TournamentDocument,
};

const NOTIFY_CAPACITY: usize = 64;

/// Failure reported while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct Offline;

#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tournaments: DashMap<Uuid, TournamentEnvelope>,
    active: RwLock<Option<Uuid>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    writes: AtomicU64,
    notifier: broadcast::Sender<TournamentDocument>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (notifier, _receiver) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                tournaments: DashMap::new(),
                active: RwLock::new(None),
                available: AtomicBool::new(true),
                latency_ms: AtomicU64::new(0),
                writes: AtomicU64::new(0),
                notifier,
            }),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of accepted writes since creation.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Stored copy of `id`, bypassing availability and latency.
    pub fn peek(&self, id: Uuid) -> Option<TournamentDocument> {
        self.inner
            .tournaments
            .get(&id)
            .map(|envelope| envelope.data.clone())
    }
}

impl MemoryInner {
    async fn gate(&self) -> StorageResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable("memory store offline", Offline))
        }
    }

    fn notify(&self, document: &TournamentDocument) {
        let _ = self.notifier.send(document.clone());
    }

    async fn fetch_active(&self) -> StorageResult<Option<TournamentDocument>> {
        self.gate().await?;
        let active = *self.active.read().await;
        Ok(active.and_then(|id| {
            self.tournaments
                .get(&id)
                .map(|envelope| envelope.data.clone())
        }))
    }

    async fn write(&self, document: TournamentDocument) -> StorageResult<()> {
        self.gate().await?;
        let id = document.id;
        self.tournaments
            .insert(id, TournamentEnvelope::wrap(document.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);

        if *self.active.read().await == Some(id) {
            self.notify(&document);
        }
        Ok(())
    }

    async fn create(&self, document: TournamentDocument) -> StorageResult<Uuid> {
        self.gate().await?;
        let id = document.id;
        self.tournaments
            .insert(id, TournamentEnvelope::wrap(document.clone()));
        *self.active.write().await = Some(id);
        self.notify(&document);
        Ok(id)
    }

    async fn set_active(&self, id: Uuid) -> StorageResult<Option<TournamentDocument>> {
        self.gate().await?;
        let Some(document) = self.tournaments.get(&id).map(|envelope| envelope.data.clone())
        else {
            return Ok(None);
        };
        *self.active.write().await = Some(id);
        self.notify(&document);
        Ok(Some(document))
    }

    async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        self.gate().await?;
        let removed = self.tournaments.remove(&id).is_some();
        let mut active = self.active.write().await;
        if *active == Some(id) {
            *active = None;
        }
        Ok(removed)
    }

    async fn list(&self) -> StorageResult<Vec<TournamentListItem>> {
        self.gate().await?;
        let mut items: Vec<_> = self
            .tournaments
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn init(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.gate().await })
    }

    fn fetch_active(&self) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.fetch_active().await })
    }

    fn write(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write(document).await })
    }

    fn subscribe(&self) -> broadcast::Receiver<TournamentDocument> {
        self.inner.notifier.subscribe()
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<TournamentListItem>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.list().await })
    }

    fn create(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<Uuid>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.create(document).await })
    }

    fn set_active(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.set_active(id).await })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.delete(id).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.gate().await })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.gate().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{mutation::Mutation, tournament::TournamentTemplate};

    fn document(name: &str, at: u64) -> TournamentDocument {
        let template = TournamentTemplate {
            name: name.to_string(),
            ..TournamentTemplate::default()
        };
        TournamentDocument::from_template(&template, at)
    }

    #[tokio::test]
    async fn write_then_read_active_round_trips() {
        let store = MemoryDocumentStore::new();
        let doc = document("Friday", 10);
        store.create(doc.clone()).await.unwrap();

        let mut updated = doc
            .apply(&Mutation::AddPlayer { name: "Alice".into() }, 20)
            .unwrap();
        updated.players.get_mut(&1).unwrap().paid_amount = 500;
        store.write(updated.clone()).await.unwrap();

        let read = store
            .read_active(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, updated);
    }

    #[tokio::test]
    async fn delete_clears_active_pointer() {
        let store = MemoryDocumentStore::new();
        let first = document("First", 1);
        let second = document("Second", 2);
        store.create(first.clone()).await.unwrap();
        store.create(second.clone()).await.unwrap();

        assert!(store.delete(second.id).await.unwrap());
        assert!(store.fetch_active().await.unwrap().is_none());
        assert!(!store.delete(second.id).await.unwrap());

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["First"]);

        assert_eq!(store.set_active(first.id).await.unwrap(), Some(first));
        assert_eq!(store.set_active(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryDocumentStore::new();
        store.set_available(false);
        let err = store.write(document("x", 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out_distinctly() {
        let store = MemoryDocumentStore::new();
        store.set_latency(Duration::from_secs(30));
        let err = store
            .read_active(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Timeout { .. }));
    }

    #[tokio::test]
    async fn writes_to_active_document_are_pushed() {
        let store = MemoryDocumentStore::new();
        let doc = document("Live", 5);
        store.create(doc.clone()).await.unwrap();
        let mut changes = store.subscribe();

        let mut newer = doc.clone();
        newer.last_updated = 6;
        store.write(newer).await.unwrap();
        store.write(document("Other", 7)).await.unwrap();

        assert_eq!(changes.recv().await.unwrap().last_updated, 6);
        assert!(changes.try_recv().is_err());
    }
}
