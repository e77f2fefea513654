use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        archive::TournamentSummary,
        tournament::{CreateTournamentRequest, TournamentView},
    },
    error::{AppError, ErrorBody},
    services::tournament_service,
    state::SharedState,
};

/// Archive of stored tournaments.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/tournaments",
            get(list_tournaments).post(create_tournament),
        )
        .route("/tournaments/{id}/load", post(load_tournament))
        .route("/tournaments/{id}", delete(delete_tournament))
}

/// Every stored tournament, newest first.
#[utoipa::path(
    get,
    path = "/tournaments",
    tag = "archive",
    responses(
        (status = 200, description = "Stored tournaments", body = [TournamentSummary]),
        (status = 503, description = "No storage backend", body = ErrorBody)
    )
)]
pub async fn list_tournaments(
    State(state): State<SharedState>,
) -> Result<Json<Vec<TournamentSummary>>, AppError> {
    Ok(Json(tournament_service::list_tournaments(&state).await?))
}

/// Start a fresh tournament from the configured template and make it current.
#[utoipa::path(
    post,
    path = "/tournaments",
    tag = "archive",
    request_body = CreateTournamentRequest,
    responses(
        (status = 200, description = "Tournament created", body = TournamentView),
        (status = 400, description = "Invalid name"),
        (status = 503, description = "No storage backend", body = ErrorBody)
    )
)]
pub async fn create_tournament(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateTournamentRequest>>,
) -> Result<Json<TournamentView>, AppError> {
    Ok(Json(
        tournament_service::create_tournament(&state, payload.name).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/tournaments/{id}/load",
    tag = "archive",
    params(("id" = String, Path, description = "Identifier of the tournament to load")),
    responses(
        (status = 200, description = "Tournament loaded", body = TournamentView),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
        (status = 503, description = "No storage backend", body = ErrorBody)
    )
)]
pub async fn load_tournament(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TournamentView>, AppError> {
    Ok(Json(tournament_service::load_tournament(&state, id).await?))
}

/// Delete a stored tournament. The loaded one cannot be deleted.
#[utoipa::path(
    delete,
    path = "/tournaments/{id}",
    tag = "archive",
    params(("id" = String, Path, description = "Identifier of the tournament to delete")),
    responses(
        (status = 204, description = "Tournament deleted"),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
        (status = 409, description = "Tournament is currently loaded", body = ErrorBody)
    )
)]
pub async fn delete_tournament(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tournament_service::delete_tournament(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
