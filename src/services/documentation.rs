use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Poker Clock Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::tournament::get_tournament,
        crate::routes::tournament::get_status,
        crate::routes::tournament::start_clock,
        crate::routes::tournament::pause_clock,
        crate::routes::tournament::reset_clock,
        crate::routes::tournament::next_entry,
        crate::routes::tournament::previous_entry,
        crate::routes::tournament::add_player,
        crate::routes::tournament::rename_player,
        crate::routes::tournament::remove_player,
        crate::routes::tournament::add_rebuy,
        crate::routes::tournament::add_addon,
        crate::routes::tournament::eliminate_player,
        crate::routes::tournament::revive_player,
        crate::routes::tournament::add_bounty,
        crate::routes::tournament::record_payment,
        crate::routes::tournament::reset_eliminations,
        crate::routes::tournament::add_entry,
        crate::routes::tournament::update_entry,
        crate::routes::tournament::remove_entry,
        crate::routes::tournament::update_settings,
        crate::routes::tournament::update_branding,
        crate::routes::tournament::sync,
        crate::routes::tournaments::list_tournaments,
        crate::routes::tournaments::create_tournament,
        crate::routes::tournaments::load_tournament,
        crate::routes::tournaments::delete_tournament,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::Health,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::SaveStatusEvent,
            crate::dto::archive::TournamentSummary,
            crate::dto::tournament::TournamentView,
            crate::dto::tournament::TournamentResponse,
            crate::dto::tournament::StatusResponse,
            crate::dto::tournament::SyncResponse,
            crate::dto::tournament::SyncOutcome,
            crate::dto::tournament::PlayerNameRequest,
            crate::dto::tournament::BountyRequest,
            crate::dto::tournament::PaymentRequest,
            crate::dto::tournament::OverpaymentPolicy,
            crate::dto::tournament::EntryRequest,
            crate::dto::tournament::EntryTypeDto,
            crate::dto::tournament::SettingsRequest,
            crate::dto::tournament::BrandingRequest,
            crate::dto::tournament::CreateTournamentRequest,
            crate::error::ErrorBody,
            crate::state::save_status::SaveStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "tournament", description = "Current tournament and manual sync"),
        (name = "clock", description = "Blind clock controls"),
        (name = "players", description = "Player ledger"),
        (name = "schedule", description = "Blind schedule editing"),
        (name = "settings", description = "Tournament name, economics and branding"),
        (name = "archive", description = "Stored tournaments"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_tournament_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/tournament/players/{id}/payment",
            "/tournament/schedule/{id}",
            "/tournament/sync",
            "/tournaments/{id}/load",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
