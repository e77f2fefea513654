use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{document_store::DocumentStore, storage::StorageError},
    services::sync_service,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, hand it to the synchronization controller
/// and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                if let Err(err) = sync_service::attach_store(&state, store.clone()).await {
                    warn!(error = %err, "storage backend could not be prepared; staying in degraded mode");
                    state.clear_store().await;
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                    continue;
                }
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "storage health check failed");
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering in degraded mode"
                                            );
                                            state.update_degraded(true);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        };
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                state.update_degraded(false);
                                sync_service::reconcile(&state, store.clone()).await;
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                state.clear_store().await;
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{document_store::memory::MemoryDocumentStore, local_cache::LocalCache},
        state::{AppState, mutation::Mutation},
    };

    fn spawn_supervisor(state: &SharedState, store: &MemoryDocumentStore) {
        let store = store.clone();
        tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn DocumentStore>) }
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn connecting_leaves_degraded_mode_and_publishes_the_tournament() {
        let state = AppState::new(AppConfig::default(), LocalCache::in_memory());
        sync_service::init(&state).await;
        let store = MemoryDocumentStore::new();
        spawn_supervisor(&state, &store);

        sleep(Duration::from_millis(50)).await;
        assert!(!state.is_degraded());
        let active = store.fetch_active().await.unwrap().unwrap();
        assert_eq!(active.id, state.document().await.id);
        sync_service::dispose(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn outage_is_flagged_and_recovered_changes_are_pushed() {
        let state = AppState::new(AppConfig::default(), LocalCache::in_memory());
        sync_service::init(&state).await;
        let store = MemoryDocumentStore::new();
        spawn_supervisor(&state, &store);
        sleep(Duration::from_millis(50)).await;

        store.set_available(false);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(100)).await;
        assert!(state.is_degraded());

        sync_service::mutate(&state, Mutation::AddPlayer { name: "Alice".into() }).await;
        store.set_available(true);
        sleep(Duration::from_secs(2)).await;
        assert!(!state.is_degraded());

        let id = state.document().await.id;
        assert_eq!(store.peek(id).unwrap().players.len(), 1);
        sync_service::dispose(&state);
    }
}
