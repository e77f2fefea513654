#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
pub mod poller;

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    dao::{
        models::TournamentListItem,
        storage::{StorageError, StorageResult},
    },
    state::tournament::TournamentDocument,
};

/// Abstraction over the remote persistence of tournament documents.
///
/// Exactly one document is marked active at a time; change notifications
/// carry full copies of the active document.
pub trait DocumentStore: Send + Sync {
    /// Prepare the backend and start change detection. Idempotent.
    fn init(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the document currently marked active, if any.
    fn fetch_active(&self) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>>;
    /// Upsert `document` under its id.
    fn write(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<()>>;
    /// Receive the active document whenever it changes remotely. Dropping the
    /// receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<TournamentDocument>;
    /// List every stored tournament.
    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<TournamentListItem>>>;
    /// Store a new tournament and mark it active.
    fn create(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<Uuid>>;
    /// Mark `id` active and return its document, or `None` when it does not exist.
    fn set_active(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>>;
    /// Delete `id`, clearing the active pointer when it referenced it.
    /// Returns whether something was deleted.
    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// [`fetch_active`](Self::fetch_active) raced against `limit`.
    fn read_active(
        &self,
        limit: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let fetch = self.fetch_active();
        Box::pin(async move {
            tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| StorageError::Timeout {
                    operation: "read_active",
                    after: limit,
                })?
        })
    }
}
