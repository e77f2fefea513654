use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{TournamentEnvelope, TournamentListItem},
    state::tournament::{Timestamp, TournamentDocument},
};

pub const ACTIVE_POINTER_ID: &str = "active";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoTournamentDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    created_at: Timestamp,
    last_updated: Timestamp,
    data: TournamentDocument,
}

impl MongoTournamentDocument {
    pub fn summary(&self) -> TournamentListItem {
        TournamentListItem {
            id: self.data.id,
            name: self.name.clone(),
            created_at: self.created_at,
        }
    }

    pub fn into_document(self) -> TournamentDocument {
        self.data
    }
}

impl From<TournamentEnvelope> for MongoTournamentDocument {
    fn from(envelope: TournamentEnvelope) -> Self {
        Self {
            id: envelope.id.to_string(),
            name: envelope.name,
            created_at: envelope.created_at,
            last_updated: envelope.last_updated,
            data: envelope.data,
        }
    }
}

/// Singleton document in the `meta` collection pointing at the active tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoActivePointer {
    #[serde(rename = "_id")]
    id: String,
    tournament_id: Option<String>,
}

impl MongoActivePointer {
    pub fn new(tournament_id: Option<Uuid>) -> Self {
        Self {
            id: ACTIVE_POINTER_ID.to_string(),
            tournament_id: tournament_id.map(|id| id.to_string()),
        }
    }

    pub fn tournament_id(&self) -> Option<Uuid> {
        self.tournament_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn pointer_filter() -> Document {
    doc! {"_id": ACTIVE_POINTER_ID}
}
