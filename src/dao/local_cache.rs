//! Device-local snapshots that survive restarts and store outages.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::tournament::TournamentDocument;

/// Fixed slots of the snapshot cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Latest locally applied document.
    TournamentState,
    /// Document whose remote write failed last.
    FailedUpdate,
    /// Id of the tournament marked active.
    ActiveTournamentId,
}

impl CacheKey {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKey::TournamentState => "tournamentState",
            CacheKey::FailedUpdate => "failedUpdate",
            CacheKey::ActiveTournamentId => "activeTournamentId",
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access cache file `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode cache entry `{key}`")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw key-value storage behind [`LocalCache`].
pub trait SnapshotStore: Send + Sync {
    fn read(&self, key: CacheKey) -> BoxFuture<'static, CacheResult<Option<String>>>;
    fn write(&self, key: CacheKey, value: String) -> BoxFuture<'static, CacheResult<()>>;
    fn remove(&self, key: CacheKey) -> BoxFuture<'static, CacheResult<()>>;
}

/// JSON files in one directory, replaced atomically through a temporary file.
#[derive(Clone)]
pub struct FileSnapshotStore {
    dir: Arc<Path>,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::from(dir.into()),
        }
    }

    fn path(&self, key: CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self, key: CacheKey) -> BoxFuture<'static, CacheResult<Option<String>>> {
        let path = self.path(key);
        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => Ok(Some(raw)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(CacheError::Io { path, source }),
            }
        })
    }

    fn write(&self, key: CacheKey, value: String) -> BoxFuture<'static, CacheResult<()>> {
        let dir = self.dir.clone();
        let path = self.path(key);
        Box::pin(async move {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| CacheError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
            tokio::fs::write(&tmp, value)
                .await
                .map_err(|source| CacheError::Io {
                    path: tmp.clone(),
                    source,
                })?;
            tokio::fs::rename(&tmp, &path)
                .await
                .map_err(|source| CacheError::Io { path, source })
        })
    }

    fn remove(&self, key: CacheKey) -> BoxFuture<'static, CacheResult<()>> {
        let path = self.path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(CacheError::Io { path, source }),
            }
        })
    }
}

/// Process-local cache, used in tests and when no cache directory is set.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    entries: Arc<Mutex<HashMap<CacheKey, String>>>,
}

impl MemorySnapshotStore {
    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<CacheKey, String>) -> T) -> T {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self, key: CacheKey) -> BoxFuture<'static, CacheResult<Option<String>>> {
        let value = self.with_entries(|entries| entries.get(&key).cloned());
        Box::pin(async move { Ok(value) })
    }

    fn write(&self, key: CacheKey, value: String) -> BoxFuture<'static, CacheResult<()>> {
        self.with_entries(|entries| entries.insert(key, value));
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, key: CacheKey) -> BoxFuture<'static, CacheResult<()>> {
        self.with_entries(|entries| entries.remove(&key));
        Box::pin(async { Ok(()) })
    }
}

/// Typed access to the snapshot slots.
///
/// Cache failures never propagate: they are logged and the cache behaves as
/// if the slot were empty.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn SnapshotStore>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Cache backed by JSON files in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileSnapshotStore::new(dir)))
    }

    /// Cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySnapshotStore::default()))
    }

    async fn load<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let raw = match self.store.read(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "failed to read local cache");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "discarding unreadable cache entry");
                None
            }
        }
    }

    async fn save<T: Serialize>(&self, key: CacheKey, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(source) => {
                let err = CacheError::Encode {
                    key: key.as_str(),
                    source,
                };
                warn!(error = %err, "failed to encode cache entry");
                return;
            }
        };
        if let Err(err) = self.store.write(key, encoded).await {
            warn!(key = key.as_str(), error = %err, "failed to write local cache");
        } else {
            debug!(key = key.as_str(), "local cache updated");
        }
    }

    /// Load a cached document from `key`, validated like any stored copy.
    pub async fn load_document(&self, key: CacheKey) -> Option<TournamentDocument> {
        self.load(key).await
    }

    pub async fn store_document(&self, key: CacheKey, document: &TournamentDocument) {
        self.save(key, document).await;
    }

    pub async fn load_active_id(&self) -> Option<Uuid> {
        self.load(CacheKey::ActiveTournamentId).await
    }

    pub async fn store_active_id(&self, id: Uuid) {
        self.save(CacheKey::ActiveTournamentId, &id).await;
    }

    /// Empty `key`.
    pub async fn clear(&self, key: CacheKey) {
        if let Err(err) = self.store.remove(key).await {
            warn!(key = key.as_str(), error = %err, "failed to clear local cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::state::tournament::TournamentTemplate;

    fn scratch_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("poker-clock-cache-{nanos}-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn file_cache_round_trips_documents_and_ids() {
        let dir = scratch_dir();
        let cache = LocalCache::in_dir(&dir);
        let document = TournamentDocument::from_template(&TournamentTemplate::default(), 77);

        assert!(cache.load_document(CacheKey::TournamentState).await.is_none());
        cache
            .store_document(CacheKey::TournamentState, &document)
            .await;
        cache.store_active_id(document.id).await;

        let reopened = LocalCache::in_dir(&dir);
        assert_eq!(
            reopened.load_document(CacheKey::TournamentState).await,
            Some(document.clone())
        );
        assert_eq!(reopened.load_active_id().await, Some(document.id));

        reopened.clear(CacheKey::TournamentState).await;
        assert!(reopened.load_document(CacheKey::TournamentState).await.is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_file_writes_leave_a_readable_entry() {
        let dir = scratch_dir();
        let cache = LocalCache::in_dir(&dir);
        let template = TournamentTemplate::default();

        let handles: Vec<_> = (1..=16)
            .map(|stamp| {
                let cache = cache.clone();
                let document = TournamentDocument::from_template(&template, stamp);
                tokio::spawn(async move {
                    cache
                        .store_document(CacheKey::TournamentState, &document)
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.load_document(CacheKey::TournamentState).await.is_some());
        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn corrupted_entry_reads_as_empty() {
        let store = MemorySnapshotStore::default();
        store
            .write(CacheKey::FailedUpdate, "{not json".to_string())
            .await
            .unwrap();
        let cache = LocalCache::new(Arc::new(store));
        assert!(cache.load_document(CacheKey::FailedUpdate).await.is_none());
    }
}
