use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoActivePointer, MongoTournamentDocument, doc_id, pointer_filter},
};
use crate::{
    dao::{
        document_store::{
            DocumentStore,
            poller::{ChangePoller, FetchActive, FetchFuture, POLL_INTERVAL},
        },
        models::{TournamentEnvelope, TournamentListItem, sort_newest_first},
        storage::StorageResult,
    },
    state::tournament::TournamentDocument,
};

const TOURNAMENT_COLLECTION_NAME: &str = "tournaments";
const META_COLLECTION_NAME: &str = "meta";
const NOTIFY_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
    poller: Arc<ChangePoller>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn database(&self) -> Database {
        let guard = self.state.read().await;
        guard.database.clone()
    }

    async fn tournaments(&self) -> Collection<MongoTournamentDocument> {
        self.database()
            .await
            .collection::<MongoTournamentDocument>(TOURNAMENT_COLLECTION_NAME)
    }

    async fn meta(&self) -> Collection<MongoActivePointer> {
        self.database()
            .await
            .collection::<MongoActivePointer>(META_COLLECTION_NAME)
    }

    async fn ping(&self) -> MongoResult<()> {
        self.database()
            .await
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = self.config.connect().await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"createdAt": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("tournament_created_idx".to_owned()))
                    .build(),
            )
            .build();

        self.tournaments()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TOURNAMENT_COLLECTION_NAME,
                index: "createdAt",
                source,
            })?;
        Ok(())
    }

    async fn active_id(&self) -> MongoResult<Option<Uuid>> {
        let pointer = self
            .meta()
            .await
            .find_one(pointer_filter())
            .await
            .map_err(|source| MongoDaoError::ActivePointer { source })?;
        Ok(pointer.and_then(|pointer| pointer.tournament_id()))
    }

    async fn set_pointer(&self, tournament_id: Option<Uuid>) -> MongoResult<()> {
        self.meta()
            .await
            .replace_one(pointer_filter(), MongoActivePointer::new(tournament_id))
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::ActivePointer { source })?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> MongoResult<Option<TournamentDocument>> {
        let document = self
            .tournaments()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadTournament { id, source })?;
        Ok(document.map(MongoTournamentDocument::into_document))
    }

    async fn fetch_active(&self) -> MongoResult<Option<TournamentDocument>> {
        match self.active_id().await? {
            Some(id) => self.load(id).await,
            None => Ok(None),
        }
    }

    async fn write(&self, document: TournamentDocument) -> MongoResult<()> {
        let id = document.id;
        let stored = MongoTournamentDocument::from(TournamentEnvelope::wrap(document));
        self.tournaments()
            .await
            .replace_one(doc_id(id), &stored)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveTournament { id, source })?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .tournaments()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteTournament { id, source })?;
        if self.active_id().await? == Some(id) {
            self.set_pointer(None).await?;
        }
        Ok(result.deleted_count > 0)
    }

    async fn list(&self) -> MongoResult<Vec<TournamentListItem>> {
        let documents: Vec<MongoTournamentDocument> = self
            .tournaments()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListTournaments { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListTournaments { source })?;

        let mut items: Vec<_> = documents.iter().map(MongoTournamentDocument::summary).collect();
        sort_newest_first(&mut items);
        Ok(items)
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = config.connect().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });
        inner.ensure_indexes().await?;

        Ok(Self {
            inner,
            poller: Arc::new(ChangePoller::new(NOTIFY_CAPACITY, POLL_INTERVAL)),
        })
    }
}

impl DocumentStore for MongoDocumentStore {
    fn init(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ping().await?;
            let inner = store.inner.clone();
            let fetch: FetchActive = Arc::new(move || -> FetchFuture {
                let inner = inner.clone();
                Box::pin(async move { inner.fetch_active().await.map_err(Into::into) })
            });
            store.poller.start(fetch).await;
            Ok(())
        })
    }

    fn fetch_active(&self) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.fetch_active().await.map_err(Into::into) })
    }

    fn write(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.write(document).await.map_err(Into::into) })
    }

    fn subscribe(&self) -> broadcast::Receiver<TournamentDocument> {
        self.poller.subscribe()
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<TournamentListItem>>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.list().await.map_err(Into::into) })
    }

    fn create(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<Uuid>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let id = document.id;
            inner.write(document).await?;
            inner.set_pointer(Some(id)).await?;
            Ok(id)
        })
    }

    fn set_active(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some(document) = inner.load(id).await? else {
                return Ok(None);
            };
            inner.set_pointer(Some(id)).await?;
            Ok(Some(document))
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.delete(id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.reconnect().await.map_err(Into::into) })
    }
}
