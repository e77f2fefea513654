use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::save_status::SaveStatus;

/// Overall state reported by `/healthcheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// A store is installed and answered its ping.
    Ok,
    /// Running from the local cache only.
    Degraded,
}

/// Payload of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: Health,
    /// Whether the store answered the ping made for this request.
    pub storage_reachable: bool,
    /// Persistence state of the local document.
    pub save_status: SaveStatus,
    /// Tournament currently held by the clock.
    pub tournament_id: Uuid,
}
