//! Poker Clock Back binary entrypoint wiring REST, SSE and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use poker_clock_back::dao::document_store::couchdb::{CouchConfig, CouchDocumentStore};
#[cfg(feature = "mongo-store")]
use poker_clock_back::dao::document_store::mongodb::{MongoConfig, MongoDocumentStore};
use poker_clock_back::{
    config::AppConfig,
    dao::{
        document_store::{DocumentStore, memory::MemoryDocumentStore},
        local_cache::LocalCache,
        storage::StorageError,
    },
    routes,
    services::{storage_supervisor, sync_service},
    state::{AppState, SharedState},
};

#[cfg(feature = "couch-store")]
const DEFAULT_BACKEND: &str = "couch";
#[cfg(not(feature = "couch-store"))]
const DEFAULT_BACKEND: &str = "memory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let cache = match &config.cache_dir {
        Some(dir) => LocalCache::in_dir(dir.clone()),
        None => LocalCache::in_memory(),
    };
    let app_state = AppState::new(config, cache);
    sync_service::init(&app_state).await;

    spawn_storage_supervisor(app_state.clone());
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    sync_service::dispose(&app_state);
    Ok(())
}

/// Pick the storage backend from `STORE_BACKEND` and supervise its connection
/// in the background.
fn spawn_storage_supervisor(state: SharedState) {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| DEFAULT_BACKEND.into());
    info!(backend = %backend, "selected storage backend");

    match backend.as_str() {
        "memory" => {
            let store = MemoryDocumentStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>) }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchDocumentStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>)
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoDocumentStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>)
            }));
        }
        other => {
            warn!(
                backend = other,
                "unknown storage backend; running from the local cache only"
            );
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
