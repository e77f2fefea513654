use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::tournament::{Timestamp, TournamentDocument, now_millis};

/// Persisted wrapper around a tournament document.
///
/// `last_updated` here is the store's own write time; freshness between
/// copies is always decided on `data.last_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentEnvelope {
    /// Identifier of the wrapped document.
    pub id: Uuid,
    /// Name copied from the document for cheap listing.
    pub name: String,
    /// Creation time copied from the document.
    pub created_at: Timestamp,
    /// Time the store last accepted a write for this id.
    pub last_updated: Timestamp,
    /// Full document payload.
    pub data: TournamentDocument,
}

impl TournamentEnvelope {
    /// Wrap `document` for persistence, stamping the store write time.
    pub fn wrap(document: TournamentDocument) -> Self {
        Self {
            id: document.id,
            name: document.name.clone(),
            created_at: document.created_at,
            last_updated: now_millis(),
            data: document,
        }
    }

    /// Listing entry for this envelope.
    pub fn summary(&self) -> TournamentListItem {
        TournamentListItem {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Archive listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentListItem {
    pub id: Uuid,
    pub name: String,
    pub created_at: Timestamp,
}

/// Sort listing rows newest first.
pub fn sort_newest_first(items: &mut [TournamentListItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
}
