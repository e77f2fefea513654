//! DTOs of the tournament archive routes.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::TournamentListItem,
    dto::format_timestamp,
    state::tournament::Timestamp,
};

/// One stored tournament, as listed by `GET /tournaments`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TournamentSummary {
    /// Tournament identifier.
    pub id: Uuid,
    /// Display label.
    pub name: String,
    /// Creation time in milliseconds since the epoch.
    pub created_at: Timestamp,
    /// Creation time formatted as RFC 3339.
    pub created_at_iso: String,
    /// Whether this is the tournament currently loaded.
    pub is_current: bool,
}

impl TournamentSummary {
    pub fn new(item: TournamentListItem, current: Uuid) -> Self {
        Self {
            is_current: item.id == current,
            created_at_iso: format_timestamp(item.created_at),
            id: item.id,
            name: item.name,
            created_at: item.created_at,
        }
    }
}
