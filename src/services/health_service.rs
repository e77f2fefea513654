use tracing::warn;

use crate::{
    dto::health::{Health, HealthResponse},
    state::SharedState,
};

/// Ping the store and report it together with the clock's save status.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage_reachable = match state.require_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    let status = if state.is_degraded() || !storage_reachable {
        Health::Degraded
    } else {
        Health::Ok
    };

    HealthResponse {
        status,
        storage_reachable,
        save_status: state.save_status(),
        tournament_id: state.document().await.id,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{document_store::memory::MemoryDocumentStore, local_cache::LocalCache},
        state::{AppState, save_status::SaveStatus},
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default(), LocalCache::in_memory());
        let health = health_status(&state).await;
        assert_eq!(health.status, Health::Degraded);
        assert!(!health.storage_reachable);
        assert_eq!(health.tournament_id, state.document().await.id);

        state
            .install_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        let health = health_status(&state).await;
        assert_eq!(health.status, Health::Ok);
        assert!(health.storage_reachable);
        assert_eq!(health.save_status, SaveStatus::Idle);
    }

    #[tokio::test]
    async fn unreachable_store_reports_degraded() {
        let state = AppState::new(AppConfig::default(), LocalCache::in_memory());
        let store = Arc::new(MemoryDocumentStore::new());
        state.install_store(store.clone()).await;
        store.set_available(false);

        let health = health_status(&state).await;
        assert_eq!(health.status, Health::Degraded);
        assert!(!health.storage_reachable);
    }

    #[test]
    fn serializes_in_camel_case() {
        let json = serde_json::to_value(HealthResponse {
            status: Health::Ok,
            storage_reachable: true,
            save_status: SaveStatus::Saved,
            tournament_id: uuid::Uuid::nil(),
        })
        .unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["storageReachable"], true);
        assert_eq!(json["saveStatus"], "saved");
    }
}
