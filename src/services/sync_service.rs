//! Synchronization controller.
//!
//! Owns every write to the canonical document: local mutations are applied
//! here, cached, broadcast and persisted through a debounced flush; remote
//! copies pushed by the store replace the canonical one under
//! last-write-wins on `last_updated`.

use std::sync::Arc;

use tokio::{
    sync::broadcast::error::RecvError,
    time::{sleep, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        document_store::DocumentStore,
        local_cache::CacheKey,
        models::TournamentListItem,
        storage::StorageResult,
    },
    dto::tournament::SyncOutcome,
    error::ServiceError,
    services::{clock_service, sse_events},
    state::{
        SharedState, TaskSlot,
        mutation::{Mutation, Rejection},
        save_status::{SaveEvent, SaveStatus},
        tournament::{Timestamp, TournamentDocument, now_millis},
    },
};

/// Result of [`mutate`]: the canonical document after the call and, when the
/// mutation was refused, the reason.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// Canonical document after the call.
    pub document: TournamentDocument,
    /// Why the mutation was refused.
    pub rejection: Option<Rejection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

/// Restore the last local snapshot and start the clock ticker.
///
/// Runs before any store is reachable so the clock works offline.
pub async fn init(state: &SharedState) {
    if let Some(cached) = state
        .cache()
        .load_document(CacheKey::TournamentState)
        .await
    {
        info!(
            tournament_id = %cached.id,
            last_updated = cached.last_updated,
            "restored tournament from local cache"
        );
        state.reset_local_revision(cached.last_updated);
        *state.document_lock().write().await = cached;
    }
    newest_local(state).await;
    clock_service::spawn_ticker(state);
}

/// Connect the controller to `store`: start change detection, follow its
/// notifications and reconcile with the active stored copy.
pub async fn attach_store(
    state: &SharedState,
    store: Arc<dyn DocumentStore>,
) -> Result<(), ServiceError> {
    store.init().await?;
    resubscribe(state, &store);
    reconcile(state, store).await;
    Ok(())
}

/// Cancel every controller task and drop the store subscription.
pub fn dispose(state: &SharedState) {
    state.dispose_tasks();
    info!("synchronization controller disposed");
}

/// Apply `mutation` to the canonical document.
///
/// A refused mutation leaves everything untouched and is only logged.
pub async fn mutate(state: &SharedState, mutation: Mutation) -> MutationOutcome {
    let label = mutation.label();
    let mut guard = state.document_lock().write().await;
    let next = match guard.apply(&mutation, now_millis()) {
        Ok(next) => next,
        Err(rejection) => {
            let document = guard.clone();
            drop(guard);
            warn!(mutation = label, reason = %rejection, "mutation rejected");
            return MutationOutcome {
                document,
                rejection: Some(rejection),
            };
        }
    };

    *guard = next.clone();
    state.note_local_change(next.last_updated);
    debug!(
        mutation = label,
        last_updated = next.last_updated,
        "applied mutation"
    );
    // Published before the lock is released so snapshots land in apply order.
    publish(state, &next).await;
    drop(guard);

    queue_write(state);
    MutationOutcome {
        document: next,
        rejection: None,
    }
}

/// Compare the local copy with the stored one and keep the newest: a newer
/// stored copy is adopted, otherwise the local one is pushed.
///
/// On timeout or failure the canonical document is left as it was and the
/// status becomes [`SaveStatus::Error`].
pub async fn sync_data(
    state: &SharedState,
) -> Result<(SyncOutcome, TournamentDocument), ServiceError> {
    let store = state.require_store().await?;
    let limit = state.config().sync.sync_timeout;
    transition(state, SaveEvent::SyncStarted);

    match timeout(limit, exchange(state, store.as_ref())).await {
        Err(_) => {
            warn!(?limit, "manual sync timed out");
            transition(state, SaveEvent::WriteFailed);
            Err(ServiceError::Timeout)
        }
        Ok(Err(err)) => {
            warn!(error = %err, "manual sync failed");
            transition(state, SaveEvent::WriteFailed);
            Err(err.into())
        }
        Ok(Ok(exchanged)) => {
            let (outcome, written) = match exchanged {
                Exchanged::Pulled(remote) => {
                    let stamp = remote.last_updated;
                    adopt_remote(state, remote).await;
                    (SyncOutcome::Pulled, stamp)
                }
                Exchanged::Pushed(stamp) => (SyncOutcome::Pushed, stamp),
            };
            state.abort_task(TaskSlot::Retry);
            state.cache().clear(CacheKey::FailedUpdate).await;
            confirm_written(state, written).await;
            info!(?outcome, "manual sync completed");
            Ok((outcome, state.document().await))
        }
    }
}

enum Exchanged {
    Pulled(TournamentDocument),
    /// `last_updated` of the copy written.
    Pushed(Timestamp),
}

async fn exchange(state: &SharedState, store: &dyn DocumentStore) -> StorageResult<Exchanged> {
    let _gate = state.write_gate().lock().await;
    let local = state.document().await;
    let stamp = local.last_updated;

    match store.fetch_active().await? {
        Some(remote) if remote.id != local.id || remote.is_newer_than(&local) => {
            Ok(Exchanged::Pulled(remote))
        }
        Some(_) => {
            store.write(local).await?;
            Ok(Exchanged::Pushed(stamp))
        }
        None => {
            store.create(local).await?;
            Ok(Exchanged::Pushed(stamp))
        }
    }
}

/// Replace the canonical document with `remote` when it is strictly newer or
/// belongs to another tournament. Returns whether it was adopted.
pub async fn adopt_remote(state: &SharedState, remote: TournamentDocument) -> bool {
    let mut guard = state.document_lock().write().await;
    let switched = remote.id != guard.id;
    if !switched && !remote.is_newer_than(&guard) {
        debug!(
            tournament_id = %remote.id,
            remote = remote.last_updated,
            local = guard.last_updated,
            "ignoring stale remote copy"
        );
        return false;
    }
    *guard = remote.clone();

    info!(
        tournament_id = %remote.id,
        last_updated = remote.last_updated,
        switched,
        "adopted remote tournament"
    );
    if switched {
        state.reset_local_revision(remote.last_updated);
        state.cache().store_active_id(remote.id).await;
    }
    publish(state, &remote).await;
    true
}

/// Bring the canonical document and the store in line after (re)connecting.
///
/// Pushes the local copy when it is newer, adopts the stored one otherwise,
/// and creates the tournament when nothing is active yet. A failure is
/// retried once after the backoff.
pub async fn reconcile(state: &SharedState, store: Arc<dyn DocumentStore>) {
    reconcile_attempt(state, store, Attempt::First).await;
}

async fn reconcile_attempt(state: &SharedState, store: Arc<dyn DocumentStore>, attempt: Attempt) {
    transition(state, SaveEvent::SyncStarted);
    match pull_or_push(state, store.as_ref()).await {
        Ok(written) => {
            state.cache().clear(CacheKey::FailedUpdate).await;
            confirm_written(state, written).await;
        }
        Err(err) => {
            warn!(?attempt, error = %err, "failed to reconcile with the store; continuing from local copy");
            transition(state, SaveEvent::WriteFailed);
            if attempt == Attempt::First {
                schedule_reconcile_retry(state, store);
            }
        }
    }
}

fn schedule_reconcile_retry(state: &SharedState, store: Arc<dyn DocumentStore>) {
    let delay = state.config().sync.retry_backoff;
    let task_state = state.clone();
    state.replace_task(
        TaskSlot::Retry,
        tokio::spawn(async move {
            sleep(delay).await;
            tokio::spawn(async move {
                reconcile_attempt(&task_state, store, Attempt::Retry).await;
            });
        }),
    );
}

/// Returns the `last_updated` of the copy the store now holds.
async fn pull_or_push(state: &SharedState, store: &dyn DocumentStore) -> StorageResult<Timestamp> {
    let local = newest_local(state).await;
    let limit = state.config().sync.read_timeout;

    match store.read_active(limit).await? {
        Some(remote) if remote.id == local.id && local.is_newer_than(&remote) => {
            let _gate = state.write_gate().lock().await;
            let current = state.document().await;
            info!(
                tournament_id = %current.id,
                local = current.last_updated,
                remote = remote.last_updated,
                "local copy is newer; pushing it"
            );
            let stamp = current.last_updated;
            store.write(current).await?;
            Ok(stamp)
        }
        Some(remote) => {
            let (id, stamp) = (remote.id, remote.last_updated);
            adopt_remote(state, remote).await;
            state.cache().store_active_id(id).await;
            Ok(stamp)
        }
        None => {
            let _gate = state.write_gate().lock().await;
            let current = state.document().await;
            let stamp = current.last_updated;
            let id = store.create(current).await?;
            info!(tournament_id = %id, "no active tournament in the store; created one");
            state.cache().store_active_id(id).await;
            Ok(stamp)
        }
    }
}

/// Canonical document, after folding in a cached failed write of the same
/// tournament when that copy is newer.
async fn newest_local(state: &SharedState) -> TournamentDocument {
    if let Some(failed) = state.cache().load_document(CacheKey::FailedUpdate).await {
        let mut guard = state.document_lock().write().await;
        if failed.id == guard.id && failed.is_newer_than(&guard) {
            info!(
                tournament_id = %failed.id,
                last_updated = failed.last_updated,
                "restoring unsaved change from local cache"
            );
            state.note_local_change(failed.last_updated);
            *guard = failed.clone();
            publish(state, &failed).await;
        }
    }
    state.document().await
}

/// List every stored tournament.
pub async fn list_tournaments(state: &SharedState) -> Result<Vec<TournamentListItem>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.list().await?)
}

/// Start a new tournament from the configured template and make it current.
pub async fn create_tournament(
    state: &SharedState,
    name: Option<String>,
) -> Result<TournamentDocument, ServiceError> {
    let store = state.require_store().await?;
    flush_pending(state).await;

    let mut template = state.config().template.clone();
    if let Some(name) = name.map(|name| name.trim().to_string()) {
        template.name = name;
    }
    let document = TournamentDocument::from_template(&template, now_millis());
    let id = store.create(document.clone()).await?;
    info!(tournament_id = %id, name = %document.name, "created tournament");

    switch_to(state, &store, document.clone()).await;
    Ok(document)
}

/// Make the stored tournament `id` active and current.
pub async fn load_tournament(
    state: &SharedState,
    id: Uuid,
) -> Result<TournamentDocument, ServiceError> {
    let store = state.require_store().await?;
    flush_pending(state).await;

    let document = store
        .set_active(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("tournament {id}")))?;
    info!(tournament_id = %id, name = %document.name, "loaded tournament");

    switch_to(state, &store, document.clone()).await;
    Ok(document)
}

/// Delete a stored tournament other than the current one.
pub async fn delete_tournament(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    if state.document().await.id == id {
        return Err(ServiceError::InvalidState(
            "cannot delete the tournament currently loaded".into(),
        ));
    }
    let store = state.require_store().await?;
    if !store.delete(id).await? {
        return Err(ServiceError::NotFound(format!("tournament {id}")));
    }
    info!(tournament_id = %id, "deleted tournament");
    Ok(())
}

async fn flush_pending(state: &SharedState) {
    if state.has_task(TaskSlot::Debounce) {
        state.abort_task(TaskSlot::Debounce);
        flush(state.clone(), Attempt::First).await;
    }
}

async fn switch_to(
    state: &SharedState,
    store: &Arc<dyn DocumentStore>,
    document: TournamentDocument,
) {
    state.abort_task(TaskSlot::Retry);
    let mut guard = state.document_lock().write().await;
    *guard = document.clone();
    state.reset_local_revision(document.last_updated);
    resubscribe(state, store);

    let cache = state.cache();
    cache.store_active_id(document.id).await;
    cache.clear(CacheKey::FailedUpdate).await;
    publish(state, &document).await;
}

fn resubscribe(state: &SharedState, store: &Arc<dyn DocumentStore>) {
    let mut receiver = store.subscribe();
    let task_state = state.clone();
    state.replace_task(
        TaskSlot::Subscription,
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(remote) => {
                        adopt_remote(&task_state, remote).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed store notifications");
                    }
                    Err(RecvError::Closed) => {
                        debug!("store notification channel closed");
                        break;
                    }
                }
            }
        }),
    );
}

/// Cache and broadcast the new canonical document. Callers hold the document
/// write lock.
async fn publish(state: &SharedState, document: &TournamentDocument) {
    state
        .cache()
        .store_document(CacheKey::TournamentState, document)
        .await;
    sse_events::broadcast_tournament_updated(state, document);
}

fn queue_write(state: &SharedState) {
    transition(state, SaveEvent::MutationQueued);
    state.abort_task(TaskSlot::Revert);
    schedule_flush(state);
}

/// Restart the quiet period; the write runs in its own task once it elapses.
fn schedule_flush(state: &SharedState) {
    let delay = state.config().sync.debounce;
    let task_state = state.clone();
    state.replace_task(
        TaskSlot::Debounce,
        tokio::spawn(async move {
            sleep(delay).await;
            tokio::spawn(flush(task_state, Attempt::First));
        }),
    );
}

async fn flush(state: SharedState, attempt: Attempt) {
    let Some(store) = state.store().await else {
        let document = state.document().await;
        warn!(
            tournament_id = %document.id,
            "no storage backend; change kept in local cache"
        );
        record_failure(&state, &document, attempt).await;
        return;
    };

    let _gate = state.write_gate().lock().await;
    let document = state.document().await;
    match store.write(document.clone()).await {
        Ok(()) => {
            debug!(
                tournament_id = %document.id,
                last_updated = document.last_updated,
                ?attempt,
                "tournament written"
            );
            if attempt == Attempt::First {
                state.abort_task(TaskSlot::Retry);
            }
            state.cache().clear(CacheKey::FailedUpdate).await;
            confirm_written(&state, document.last_updated).await;
        }
        Err(err) => {
            warn!(
                tournament_id = %document.id,
                ?attempt,
                error = %err,
                "failed to write tournament"
            );
            record_failure(&state, &document, attempt).await;
        }
    }
}

async fn record_failure(state: &SharedState, document: &TournamentDocument, attempt: Attempt) {
    transition(state, SaveEvent::WriteFailed);
    state
        .cache()
        .store_document(CacheKey::FailedUpdate, document)
        .await;

    match attempt {
        Attempt::First => schedule_retry(state),
        Attempt::Retry => {
            warn!("retry failed; keeping the change cached until the next write");
        }
    }
}

fn schedule_retry(state: &SharedState) {
    let delay = state.config().sync.retry_backoff;
    let task_state = state.clone();
    state.replace_task(
        TaskSlot::Retry,
        tokio::spawn(async move {
            sleep(delay).await;
            info!("retrying failed write");
            tokio::spawn(flush(task_state, Attempt::Retry));
        }),
    );
}

/// Report that the copy stamped `written` reached the store. The status only
/// becomes saved when no newer local change is still waiting for its write.
async fn confirm_written(state: &SharedState, written: Timestamp) {
    // Mutations note their revision under the write lock, so none can slip in
    // between this check and the status change.
    let _canonical = state.document_lock().read().await;
    let pending = state.local_revision();
    if pending > written {
        debug!(written, pending, "newer change pending; staying in saving");
        return;
    }
    mark_saved(state);
}

fn mark_saved(state: &SharedState) {
    if transition(state, SaveEvent::WriteSucceeded) != SaveStatus::Saved {
        return;
    }
    let delay = state.config().sync.saved_status;
    let task_state = state.clone();
    state.replace_task(
        TaskSlot::Revert,
        tokio::spawn(async move {
            sleep(delay).await;
            transition(&task_state, SaveEvent::SavedExpired);
        }),
    );
}

/// Feed `event` through the save status table and broadcast any change.
/// Returns the status after the event.
fn transition(state: &SharedState, event: SaveEvent) -> SaveStatus {
    let mut refused = None;
    let changed = state
        .save_status_sender()
        .send_if_modified(|status| match status.on(event) {
            Ok(next) => {
                let changed = next != *status;
                *status = next;
                changed
            }
            Err(err) => {
                refused = Some(err);
                false
            }
        });

    if let Some(err) = refused {
        debug!(error = %err, "ignoring save status event");
    }
    let current = state.save_status();
    if changed {
        sse_events::broadcast_save_status(state, current);
    }
    current
}
