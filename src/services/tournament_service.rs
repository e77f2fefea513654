//! Business logic behind the tournament REST routes. Every change goes
//! through the synchronization controller; this layer only shapes requests
//! into mutations and applies the policies that need the caller's say.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        archive::TournamentSummary,
        tournament::{
            OverpaymentPolicy, PaymentRequest, SettingsRequest, StatusResponse, SyncResponse,
            TournamentResponse, TournamentView,
        },
    },
    error::ServiceError,
    services::sync_service::{self, MutationOutcome},
    state::{
        SharedState,
        mutation::{Mutation, Rejection},
        stats::PlayerLedger,
        tournament::{EntryId, PlayerId},
    },
};

fn respond(outcome: MutationOutcome) -> TournamentResponse {
    TournamentResponse {
        view: outcome.document.into(),
        warning: outcome.rejection.map(|rejection| rejection.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

/// Current document with its statistics and ranking.
pub async fn view(state: &SharedState) -> TournamentView {
    state.document().await.into()
}

/// Clock and persistence status without the document body.
pub async fn status(state: &SharedState) -> StatusResponse {
    let document = state.document_lock().read().await;
    StatusResponse::new(&document, state.save_status(), state.is_degraded())
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Apply `mutation`. A refused mutation answers with the unchanged document
/// and the reason as a warning.
pub async fn apply(state: &SharedState, mutation: Mutation) -> TournamentResponse {
    respond(sync_service::mutate(state, mutation).await)
}

/// Record money received from player `id`, resolving overpayments with the
/// requested policy.
pub async fn record_payment(
    state: &SharedState,
    id: PlayerId,
    request: PaymentRequest,
) -> Result<TournamentResponse, ServiceError> {
    let owed = {
        let document = state.document_lock().read().await;
        document
            .players
            .get(&id)
            .map(|player| PlayerLedger::of(player, &document.economics).owed)
    };

    let amount = match (owed, request.policy) {
        (Some(owed), OverpaymentPolicy::Confirm) if request.amount > owed => {
            debug!(player_id = id, amount = request.amount, owed, "payment needs confirmation");
            return Err(ServiceError::Overpayment {
                amount: request.amount,
                outstanding: owed,
            });
        }
        (Some(owed), OverpaymentPolicy::Cap) => request.amount.min(owed),
        _ => request.amount,
    };

    Ok(apply(state, Mutation::RecordPayment { id, amount }).await)
}

/// Remove schedule entry `id`; the schedule always keeps at least one entry.
pub async fn remove_entry(
    state: &SharedState,
    id: EntryId,
) -> Result<TournamentResponse, ServiceError> {
    {
        let document = state.document_lock().read().await;
        let is_last = document.schedule.len() == 1 && document.schedule[0].id == id;
        if is_last {
            return Err(ServiceError::InvalidState(
                "cannot remove the last schedule entry".into(),
            ));
        }
    }
    Ok(apply(state, Mutation::RemoveEntry { id }).await)
}

/// Rename the tournament and update its economics in one request.
pub async fn update_settings(
    state: &SharedState,
    request: SettingsRequest,
) -> Result<TournamentResponse, ServiceError> {
    let economics = request.economics();
    let mut response = None;
    if let Some(name) = request.name {
        let renamed = apply(state, Mutation::RenameTournament { name }).await;
        if renamed.warning.is_some() {
            return Ok(renamed);
        }
        response = Some(renamed);
    }
    if let Some(patch) = economics {
        response = Some(apply(state, Mutation::UpdateEconomics(patch)).await);
    }

    match response {
        Some(response) => Ok(response),
        None => Ok(TournamentResponse {
            view: view(state).await,
            warning: Some(Rejection::EmptyPatch.to_string()),
        }),
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Manual sync with the store.
pub async fn sync(state: &SharedState) -> Result<SyncResponse, ServiceError> {
    let (outcome, document) = sync_service::sync_data(state).await?;
    Ok(SyncResponse {
        outcome,
        view: document.into(),
    })
}

/// Stored tournaments, flagging the one currently loaded.
pub async fn list_tournaments(
    state: &SharedState,
) -> Result<Vec<TournamentSummary>, ServiceError> {
    let current = state.document_lock().read().await.id;
    let items = sync_service::list_tournaments(state).await?;
    Ok(items
        .into_iter()
        .map(|item| TournamentSummary::new(item, current))
        .collect())
}

/// Start a new tournament and make it current.
pub async fn create_tournament(
    state: &SharedState,
    name: Option<String>,
) -> Result<TournamentView, ServiceError> {
    let document = sync_service::create_tournament(state, name).await?;
    Ok(document.into())
}

/// Make a stored tournament current.
pub async fn load_tournament(state: &SharedState, id: Uuid) -> Result<TournamentView, ServiceError> {
    let document = sync_service::load_tournament(state, id).await?;
    Ok(document.into())
}

/// Remove a tournament other than the current one from the archive.
pub async fn delete_tournament(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    sync_service::delete_tournament(state, id).await?;
    info!(tournament_id = %id, "tournament removed from the archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::local_cache::LocalCache,
        state::{
            AppState,
            tournament::{Economics, ScheduleEntry, TournamentTemplate},
        },
    };

    fn state_with(template: TournamentTemplate) -> SharedState {
        let config = AppConfig {
            template,
            ..AppConfig::default()
        };
        AppState::new(config, LocalCache::in_memory())
    }

    fn alice_economics() -> TournamentTemplate {
        TournamentTemplate {
            economics: Economics {
                initial_chips: 10_000,
                rebuy_chips: 10_000,
                addon_chips: 5_000,
                entry_fee: 2_000,
                rebuy_fee: 2_000,
                addon_fee: 1_000,
            },
            ..TournamentTemplate::default()
        }
    }

    async fn with_alice(state: &SharedState) -> PlayerId {
        let response = apply(state, Mutation::AddPlayer { name: "Alice".into() }).await;
        let players = &response.view.document.players;
        *players.keys().next().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_change_is_reported_as_warning() {
        let state = state_with(TournamentTemplate::default());
        let response = apply(&state, Mutation::PauseClock).await;
        assert_eq!(response.warning.as_deref(), Some("the clock is not running"));
        assert!(!response.view.document.is_running);
        sync_service::dispose(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn overpayment_needs_confirmation_by_default() {
        let state = state_with(alice_economics());
        let alice = with_alice(&state).await;
        apply(&state, Mutation::AddRebuy { id: alice }).await;

        let err = record_payment(
            &state,
            alice,
            PaymentRequest {
                amount: 5_000,
                policy: OverpaymentPolicy::Confirm,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Overpayment {
                amount: 5_000,
                outstanding: 4_000
            }
        ));
        assert_eq!(state.document().await.players[&alice].paid_amount, 0);

        let capped = record_payment(
            &state,
            alice,
            PaymentRequest {
                amount: 5_000,
                policy: OverpaymentPolicy::Cap,
            },
        )
        .await
        .unwrap();
        assert_eq!(capped.view.document.players[&alice].paid_amount, 4_000);

        let accepted = record_payment(
            &state,
            alice,
            PaymentRequest {
                amount: 500,
                policy: OverpaymentPolicy::Accept,
            },
        )
        .await
        .unwrap();
        assert_eq!(accepted.view.document.players[&alice].paid_amount, 4_500);
        sync_service::dispose(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn last_schedule_entry_cannot_be_removed() {
        let state = state_with(TournamentTemplate {
            schedule: vec![
                ScheduleEntry::level(1, 25, 50, 0, 15),
                ScheduleEntry::level(2, 50, 100, 0, 15),
            ],
            ..TournamentTemplate::default()
        });

        let response = remove_entry(&state, 1).await.unwrap();
        assert!(response.warning.is_none());
        assert_eq!(response.view.document.schedule.len(), 1);

        let err = remove_entry(&state, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let unknown = remove_entry(&state, 7).await.unwrap();
        assert!(unknown.warning.is_some());
        sync_service::dispose(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_rename_and_reprice() {
        let state = state_with(TournamentTemplate::default());
        let response = update_settings(
            &state,
            SettingsRequest {
                name: Some("  Friday Deepstack ".into()),
                entry_fee: Some(3_000),
                ..SettingsRequest::default()
            },
        )
        .await
        .unwrap();

        let document = response.view.document;
        assert_eq!(document.name, "Friday Deepstack");
        assert_eq!(document.economics.entry_fee, 3_000);

        let empty = update_settings(&state, SettingsRequest::default())
            .await
            .unwrap();
        assert_eq!(empty.warning.as_deref(), Some("nothing to change"));
        sync_service::dispose(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_degraded_without_a_store() {
        let state = state_with(TournamentTemplate::default());
        let status = status(&state).await;
        assert!(status.degraded);
        assert!(!status.is_running);
        assert!(matches!(sync(&state).await, Err(ServiceError::Degraded)));
        sync_service::dispose(&state);
    }
}
