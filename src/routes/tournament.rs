use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::tournament::{
        BountyRequest, BrandingRequest, EntryRequest, MAX_IMAGE_LEN, PaymentRequest,
        PlayerNameRequest, SettingsRequest, StatusResponse, SyncResponse, TournamentResponse, TournamentView,
    },
    error::{AppError, ErrorBody},
    services::tournament_service,
    state::{
        SharedState,
        mutation::{Mutation, Step},
        tournament::{EntryId, PlayerId},
    },
};

/// Two full-size images plus the JSON around them.
const BRANDING_BODY_LIMIT: usize = 2 * MAX_IMAGE_LEN as usize + 64 * 1024;

/// Routes operating on the current tournament.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/tournament", get(get_tournament))
        .route("/tournament/status", get(get_status))
        .route("/tournament/clock/start", post(start_clock))
        .route("/tournament/clock/pause", post(pause_clock))
        .route("/tournament/clock/reset", post(reset_clock))
        .route("/tournament/clock/next", post(next_entry))
        .route("/tournament/clock/previous", post(previous_entry))
        .route("/tournament/players", post(add_player))
        .route(
            "/tournament/players/{id}",
            put(rename_player).delete(remove_player),
        )
        .route("/tournament/players/{id}/rebuy", post(add_rebuy))
        .route("/tournament/players/{id}/addon", post(add_addon))
        .route("/tournament/players/{id}/eliminate", post(eliminate_player))
        .route("/tournament/players/{id}/revive", post(revive_player))
        .route("/tournament/players/{id}/bounty", post(add_bounty))
        .route("/tournament/players/{id}/payment", post(record_payment))
        .route("/tournament/eliminations/reset", post(reset_eliminations))
        .route("/tournament/schedule", post(add_entry))
        .route(
            "/tournament/schedule/{id}",
            put(update_entry).delete(remove_entry),
        )
        .route("/tournament/settings", put(update_settings))
        .route(
            "/tournament/branding",
            put(update_branding).layer(DefaultBodyLimit::max(BRANDING_BODY_LIMIT)),
        )
        .route("/tournament/sync", post(sync))
}

async fn apply(state: &SharedState, mutation: Mutation) -> Json<TournamentResponse> {
    Json(tournament_service::apply(state, mutation).await)
}

// ---------------------------------------------------------------------------
// Read-only
// ---------------------------------------------------------------------------

/// Current tournament with its statistics and chip ranking.
#[utoipa::path(
    get,
    path = "/tournament",
    tag = "tournament",
    responses((status = 200, description = "Current tournament", body = TournamentView))
)]
pub async fn get_tournament(State(state): State<SharedState>) -> Json<TournamentView> {
    Json(tournament_service::view(&state).await)
}

/// Clock and persistence status, cheap enough to poll.
#[utoipa::path(
    get,
    path = "/tournament/status",
    tag = "tournament",
    responses((status = 200, description = "Clock and save status", body = StatusResponse))
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(tournament_service::status(&state).await)
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/tournament/clock/start",
    tag = "clock",
    responses((status = 200, description = "Clock started", body = TournamentResponse))
)]
pub async fn start_clock(State(state): State<SharedState>) -> Json<TournamentResponse> {
    apply(&state, Mutation::StartClock).await
}

#[utoipa::path(
    post,
    path = "/tournament/clock/pause",
    tag = "clock",
    responses((status = 200, description = "Clock paused", body = TournamentResponse))
)]
pub async fn pause_clock(State(state): State<SharedState>) -> Json<TournamentResponse> {
    apply(&state, Mutation::PauseClock).await
}

/// Stop the clock and restore the full duration of the current entry.
#[utoipa::path(
    post,
    path = "/tournament/clock/reset",
    tag = "clock",
    responses((status = 200, description = "Clock reset", body = TournamentResponse))
)]
pub async fn reset_clock(State(state): State<SharedState>) -> Json<TournamentResponse> {
    apply(&state, Mutation::ResetClock).await
}

#[utoipa::path(
    post,
    path = "/tournament/clock/next",
    tag = "clock",
    responses((status = 200, description = "Moved to the next entry", body = TournamentResponse))
)]
pub async fn next_entry(State(state): State<SharedState>) -> Json<TournamentResponse> {
    apply(&state, Mutation::AdvanceEntry(Step::Next)).await
}

#[utoipa::path(
    post,
    path = "/tournament/clock/previous",
    tag = "clock",
    responses((status = 200, description = "Moved to the previous entry", body = TournamentResponse))
)]
pub async fn previous_entry(State(state): State<SharedState>) -> Json<TournamentResponse> {
    apply(&state, Mutation::AdvanceEntry(Step::Previous)).await
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Register a player with the current starting stack.
#[utoipa::path(
    post,
    path = "/tournament/players",
    tag = "players",
    request_body = PlayerNameRequest,
    responses(
        (status = 200, description = "Player added", body = TournamentResponse),
        (status = 400, description = "Invalid name")
    )
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PlayerNameRequest>>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::AddPlayer { name: payload.name }).await
}

#[utoipa::path(
    put,
    path = "/tournament/players/{id}",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    request_body = PlayerNameRequest,
    responses(
        (status = 200, description = "Player renamed", body = TournamentResponse),
        (status = 400, description = "Invalid name")
    )
)]
pub async fn rename_player(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
    Valid(Json(payload)): Valid<Json<PlayerNameRequest>>,
) -> Json<TournamentResponse> {
    apply(
        &state,
        Mutation::RenamePlayer {
            id,
            name: payload.name,
        },
    )
    .await
}

/// Remove a player. Other players keep their ids and elimination ranks.
#[utoipa::path(
    delete,
    path = "/tournament/players/{id}",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    responses((status = 200, description = "Player removed", body = TournamentResponse))
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::RemovePlayer { id }).await
}

#[utoipa::path(
    post,
    path = "/tournament/players/{id}/rebuy",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    responses((status = 200, description = "Rebuy recorded", body = TournamentResponse))
)]
pub async fn add_rebuy(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::AddRebuy { id }).await
}

#[utoipa::path(
    post,
    path = "/tournament/players/{id}/addon",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    responses((status = 200, description = "Add-on recorded", body = TournamentResponse))
)]
pub async fn add_addon(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::AddAddon { id }).await
}

#[utoipa::path(
    post,
    path = "/tournament/players/{id}/eliminate",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    responses((status = 200, description = "Player eliminated", body = TournamentResponse))
)]
pub async fn eliminate_player(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::EliminatePlayer { id }).await
}

/// Bring an eliminated player back; counts as a rebuy.
#[utoipa::path(
    post,
    path = "/tournament/players/{id}/revive",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    responses((status = 200, description = "Player revived", body = TournamentResponse))
)]
pub async fn revive_player(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::RevivePlayer { id }).await
}

#[utoipa::path(
    post,
    path = "/tournament/players/{id}/bounty",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    request_body = BountyRequest,
    responses(
        (status = 200, description = "Bounty chips added", body = TournamentResponse),
        (status = 400, description = "Invalid amount")
    )
)]
pub async fn add_bounty(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
    Valid(Json(payload)): Valid<Json<BountyRequest>>,
) -> Json<TournamentResponse> {
    apply(
        &state,
        Mutation::AddBountyChips {
            id,
            amount: payload.amount,
        },
    )
    .await
}

/// Record a payment. With the default `confirm` policy an overpayment is
/// refused with the outstanding balance.
#[utoipa::path(
    post,
    path = "/tournament/players/{id}/payment",
    tag = "players",
    params(("id" = u32, Path, description = "Player identifier")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = TournamentResponse),
        (status = 400, description = "Invalid amount"),
        (status = 409, description = "Payment exceeds the outstanding balance", body = ErrorBody)
    )
)]
pub async fn record_payment(
    State(state): State<SharedState>,
    Path(id): Path<PlayerId>,
    Valid(Json(payload)): Valid<Json<PaymentRequest>>,
) -> Result<Json<TournamentResponse>, AppError> {
    Ok(Json(
        tournament_service::record_payment(&state, id, payload).await?,
    ))
}

/// Bring every eliminated player back without counting rebuys.
#[utoipa::path(
    post,
    path = "/tournament/eliminations/reset",
    tag = "players",
    responses((status = 200, description = "Eliminations cleared", body = TournamentResponse))
)]
pub async fn reset_eliminations(State(state): State<SharedState>) -> Json<TournamentResponse> {
    apply(&state, Mutation::ResetEliminations).await
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Append a level or pause; unset fields take defaults.
#[utoipa::path(
    post,
    path = "/tournament/schedule",
    tag = "schedule",
    request_body = EntryRequest,
    responses(
        (status = 200, description = "Entry added", body = TournamentResponse),
        (status = 400, description = "Invalid entry")
    )
)]
pub async fn add_entry(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<EntryRequest>>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::AddEntry(payload.into())).await
}

#[utoipa::path(
    put,
    path = "/tournament/schedule/{id}",
    tag = "schedule",
    params(("id" = u32, Path, description = "Schedule entry identifier")),
    request_body = EntryRequest,
    responses(
        (status = 200, description = "Entry updated", body = TournamentResponse),
        (status = 400, description = "Invalid entry")
    )
)]
pub async fn update_entry(
    State(state): State<SharedState>,
    Path(id): Path<EntryId>,
    Valid(Json(payload)): Valid<Json<EntryRequest>>,
) -> Json<TournamentResponse> {
    apply(
        &state,
        Mutation::UpdateEntry {
            id,
            patch: payload.into(),
        },
    )
    .await
}

#[utoipa::path(
    delete,
    path = "/tournament/schedule/{id}",
    tag = "schedule",
    params(("id" = u32, Path, description = "Schedule entry identifier")),
    responses(
        (status = 200, description = "Entry removed", body = TournamentResponse),
        (status = 409, description = "The schedule would be empty", body = ErrorBody)
    )
)]
pub async fn remove_entry(
    State(state): State<SharedState>,
    Path(id): Path<EntryId>,
) -> Result<Json<TournamentResponse>, AppError> {
    Ok(Json(tournament_service::remove_entry(&state, id).await?))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Rename the tournament and change chip and fee settings.
#[utoipa::path(
    put,
    path = "/tournament/settings",
    tag = "settings",
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = TournamentResponse),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SettingsRequest>>,
) -> Result<Json<TournamentResponse>, AppError> {
    Ok(Json(
        tournament_service::update_settings(&state, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/tournament/branding",
    tag = "settings",
    request_body = BrandingRequest,
    responses(
        (status = 200, description = "Branding updated", body = TournamentResponse),
        (status = 400, description = "Invalid image payload")
    )
)]
pub async fn update_branding(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<BrandingRequest>>,
) -> Json<TournamentResponse> {
    apply(&state, Mutation::UpdateBranding(payload.into())).await
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Reconcile with the store right away, keeping whichever copy is newest.
#[utoipa::path(
    post,
    path = "/tournament/sync",
    tag = "tournament",
    responses(
        (status = 200, description = "Sync completed", body = SyncResponse),
        (status = 503, description = "No storage backend", body = ErrorBody),
        (status = 504, description = "Storage did not answer in time", body = ErrorBody)
    )
)]
pub async fn sync(State(state): State<SharedState>) -> Result<Json<SyncResponse>, AppError> {
    Ok(Json(tournament_service::sync(&state).await?))
}
