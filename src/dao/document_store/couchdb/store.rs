use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tokio::sync::broadcast;
use uuid::Uuid;

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

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        ACTIVE_DOC_ID, AllDocsResponse, CouchActivePointer, CouchTournamentDocument, END_SUFFIX,
        RevisionOnly, TOURNAMENT_PREFIX, tournament_doc_id,
    },
};

const NOTIFY_CAPACITY: usize = 16;

/// HTTP access to one CouchDB database.
#[derive(Clone)]
struct CouchClient {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

#[derive(Clone)]
pub struct CouchDocumentStore {
    client: CouchClient,
    poller: Arc<ChangePoller>,
}

impl CouchDocumentStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let client = CouchClient {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            database: Arc::<str>::from(config.database),
            auth,
        };
        client.ensure_database().await?;

        Ok(Self {
            client,
            poller: Arc::new(ChangePoller::new(NOTIFY_CAPACITY, POLL_INTERVAL)),
        })
    }
}

impl CouchClient {
    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.with_auth(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseQuery {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response.json::<serde_json::Value>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                from_value(value)
                    .map(Some)
                    .map_err(|source| CouchDaoError::DeserializeValue {
                        path: doc_id.to_string(),
                        source,
                    })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn current_rev(&self, doc_id: &str) -> CouchResult<Option<String>> {
        Ok(self
            .get_document::<RevisionOnly>(doc_id)
            .await?
            .map(|doc| doc.rev))
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn delete_document(&self, doc_id: &str) -> CouchResult<bool> {
        let Some(rev) = self.current_rev(doc_id).await? else {
            return Ok(false);
        };

        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn active_id(&self) -> CouchResult<Option<Uuid>> {
        Ok(self
            .get_document::<CouchActivePointer>(ACTIVE_DOC_ID)
            .await?
            .and_then(|pointer| pointer.tournament_id))
    }

    async fn set_pointer(&self, tournament_id: Option<Uuid>) -> CouchResult<()> {
        let rev = self.current_rev(ACTIVE_DOC_ID).await?;
        self.put_document(ACTIVE_DOC_ID, &CouchActivePointer::new(tournament_id, rev))
            .await
    }

    async fn load(&self, id: Uuid) -> CouchResult<Option<TournamentDocument>> {
        Ok(self
            .get_document::<CouchTournamentDocument>(&tournament_doc_id(id))
            .await?
            .map(|doc| doc.envelope.data))
    }

    async fn fetch_active(&self) -> CouchResult<Option<TournamentDocument>> {
        match self.active_id().await? {
            Some(id) => self.load(id).await,
            None => Ok(None),
        }
    }

    async fn write(&self, document: TournamentDocument) -> CouchResult<()> {
        let doc_id = tournament_doc_id(document.id);
        let rev = self.current_rev(&doc_id).await?;
        let doc = CouchTournamentDocument::from((TournamentEnvelope::wrap(document), rev));
        self.put_document(&doc_id, &doc).await
    }

    async fn list(&self) -> CouchResult<Vec<TournamentListItem>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{TOURNAMENT_PREFIX}\"")),
            ("endkey", format!("\"{TOURNAMENT_PREFIX}{END_SUFFIX}\"")),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut items = Vec::with_capacity(payload.rows.len());
        for doc in payload.rows.into_iter().filter_map(|row| row.doc) {
            let parsed: CouchTournamentDocument =
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
            items.push(parsed.envelope.summary());
        }
        sort_newest_first(&mut items);
        Ok(items)
    }
}

impl DocumentStore for CouchDocumentStore {
    fn init(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.client.ensure_database().await?;
            let client = store.client.clone();
            let fetch: FetchActive = Arc::new(move || -> FetchFuture {
                let client = client.clone();
                Box::pin(async move { client.fetch_active().await.map_err(Into::into) })
            });
            store.poller.start(fetch).await;
            Ok(())
        })
    }

    fn fetch_active(&self) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let client = self.client.clone();
        Box::pin(async move { client.fetch_active().await.map_err(Into::into) })
    }

    fn write(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<()>> {
        let client = self.client.clone();
        Box::pin(async move { client.write(document).await.map_err(Into::into) })
    }

    fn subscribe(&self) -> broadcast::Receiver<TournamentDocument> {
        self.poller.subscribe()
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<TournamentListItem>>> {
        let client = self.client.clone();
        Box::pin(async move { client.list().await.map_err(Into::into) })
    }

    fn create(&self, document: TournamentDocument) -> BoxFuture<'static, StorageResult<Uuid>> {
        let client = self.client.clone();
        Box::pin(async move {
            let id = document.id;
            client.write(document).await?;
            client.set_pointer(Some(id)).await?;
            Ok(id)
        })
    }

    fn set_active(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentDocument>>> {
        let client = self.client.clone();
        Box::pin(async move {
            let Some(document) = client.load(id).await? else {
                return Ok(None);
            };
            client.set_pointer(Some(id)).await?;
            Ok(Some(document))
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let client = self.client.clone();
        Box::pin(async move {
            let deleted = client.delete_document(&tournament_doc_id(id)).await?;
            if client.active_id().await? == Some(id) {
                client.set_pointer(None).await?;
            }
            Ok(deleted)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let client = self.client.clone();
        Box::pin(async move {
            let url = client.database_url();
            let response = client
                .with_auth(client.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let client = self.client.clone();
        Box::pin(async move { client.ensure_database().await.map_err(Into::into) })
    }
}
