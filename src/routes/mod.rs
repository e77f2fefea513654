use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod health;
pub mod sse;
pub mod tournament;
pub mod tournaments;

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Compose all route trees with the Swagger UI mounted at `/docs`.
pub fn router(state: SharedState) -> Router<()> {
    let swagger: Router<SharedState> = SwaggerUi::new("/docs")
        .url(OPENAPI_PATH, ApiDoc::openapi())
        .into();

    health::router()
        .merge(sse::router())
        .merge(tournament::router())
        .merge(tournaments::router())
        .merge(swagger)
        .with_state(state)
}
