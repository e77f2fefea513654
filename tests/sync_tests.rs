use std::{sync::Arc, time::Duration};

use poker_clock_back::{
    config::AppConfig,
    dao::{
        document_store::{DocumentStore, memory::MemoryDocumentStore},
        local_cache::{CacheKey, LocalCache},
    },
    services::sync_service,
    state::{
        AppState, SharedState, mutation::Mutation, save_status::SaveStatus,
        tournament::TournamentDocument,
    },
};
use tokio::time::sleep;

async fn controller(store: &MemoryDocumentStore) -> SharedState {
    let state = AppState::new(AppConfig::default(), LocalCache::in_memory());
    sync_service::init(&state).await;
    let handle: Arc<dyn DocumentStore> = Arc::new(store.clone());
    state.install_store(handle.clone()).await;
    sync_service::attach_store(&state, handle).await.unwrap();
    state
}

fn player_names(document: &TournamentDocument) -> Vec<String> {
    document
        .players
        .values()
        .map(|player| player.name.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn second_controller_joins_the_active_tournament() {
    let store = MemoryDocumentStore::new();
    let first = controller(&store).await;
    let second = controller(&store).await;

    assert_eq!(first.document().await, second.document().await);
    assert_eq!(store.list().await.unwrap().len(), 1);

    sync_service::dispose(&first);
    sync_service::dispose(&second);
}

#[tokio::test(start_paused = true)]
async fn changes_on_one_controller_reach_the_other() {
    let store = MemoryDocumentStore::new();
    let first = controller(&store).await;
    let second = controller(&store).await;

    sync_service::mutate(&first, Mutation::AddPlayer { name: "Alice".into() }).await;
    sync_service::mutate(&first, Mutation::StartClock).await;
    sleep(Duration::from_millis(50)).await;
    assert!(second.document().await.players.is_empty());

    sleep(Duration::from_millis(400)).await;
    let seen = second.document().await;
    assert_eq!(player_names(&seen), vec!["Alice".to_string()]);
    assert!(seen.is_running);
    assert_eq!(seen.last_updated, first.document().await.last_updated);

    sync_service::dispose(&first);
    sync_service::dispose(&second);
}

#[tokio::test(start_paused = true)]
async fn older_copy_does_not_override_a_newer_local_change() {
    let store = MemoryDocumentStore::new();
    let first = controller(&store).await;
    let second = controller(&store).await;
    let original = first.document().await;

    sync_service::mutate(&second, Mutation::AddPlayer { name: "Bob".into() }).await;
    let mut older = original.clone();
    older.name = "Outdated".into();
    store.write(older).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(player_names(&second.document().await), vec!["Bob".to_string()]);

    sleep(Duration::from_millis(400)).await;
    let converged = first.document().await;
    assert_eq!(converged, second.document().await);
    assert_eq!(converged.name, original.name);

    sync_service::dispose(&first);
    sync_service::dispose(&second);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_retried_and_then_propagated() {
    let store = MemoryDocumentStore::new();
    let first = controller(&store).await;
    let second = controller(&store).await;

    store.set_available(false);
    sync_service::mutate(&first, Mutation::AddPlayer { name: "Carol".into() }).await;
    sleep(Duration::from_millis(400)).await;
    assert_eq!(first.save_status(), SaveStatus::Error);
    assert!(
        first
            .cache()
            .load_document(CacheKey::FailedUpdate)
            .await
            .is_some()
    );
    assert!(second.document().await.players.is_empty());

    store.set_available(true);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(first.save_status(), SaveStatus::Saved);
    assert_eq!(player_names(&second.document().await), vec!["Carol".to_string()]);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(first.save_status(), SaveStatus::Idle);

    sync_service::dispose(&first);
    sync_service::dispose(&second);
}

#[tokio::test(start_paused = true)]
async fn loading_a_tournament_switches_every_controller() {
    let store = MemoryDocumentStore::new();
    let first = controller(&store).await;
    let second = controller(&store).await;
    let original = first.document().await.id;

    let created = sync_service::create_tournament(&first, Some("Sunday".into()))
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(second.document().await.id, created.id);

    sync_service::load_tournament(&second, original).await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(first.document().await.id, original);

    sync_service::dispose(&first);
    sync_service::dispose(&second);
}

#[tokio::test(start_paused = true)]
async fn manual_sync_times_out_without_touching_the_document() {
    let store = MemoryDocumentStore::new();
    let state = controller(&store).await;
    let before = state.document().await;

    store.set_latency(Duration::from_secs(30));
    assert!(sync_service::sync_data(&state).await.is_err());
    assert_eq!(state.document().await, before);
    assert_eq!(state.save_status(), SaveStatus::Error);

    sync_service::dispose(&state);
}
