use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::TournamentEnvelope;

pub const TOURNAMENT_PREFIX: &str = "tournament::";
pub const ACTIVE_DOC_ID: &str = "meta::active";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Revision-only view used before overwriting or deleting a document.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchTournamentDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub envelope: TournamentEnvelope,
}

impl From<(TournamentEnvelope, Option<String>)> for CouchTournamentDocument {
    fn from((envelope, rev): (TournamentEnvelope, Option<String>)) -> Self {
        Self {
            id: tournament_doc_id(envelope.id),
            rev,
            envelope,
        }
    }
}

/// Singleton document holding the active tournament pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouchActivePointer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub tournament_id: Option<Uuid>,
}

impl CouchActivePointer {
    pub fn new(tournament_id: Option<Uuid>, rev: Option<String>) -> Self {
        Self {
            id: ACTIVE_DOC_ID.to_string(),
            rev,
            tournament_id,
        }
    }
}

pub fn tournament_doc_id(id: Uuid) -> String {
    format!("{TOURNAMENT_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tournament::{TournamentDocument, TournamentTemplate};

    #[test]
    fn envelope_fields_sit_next_to_couch_metadata() {
        let document = TournamentDocument::from_template(&TournamentTemplate::default(), 3);
        let id = document.id;
        let couch = CouchTournamentDocument::from((
            TournamentEnvelope::wrap(document),
            Some("1-abc".to_string()),
        ));

        let json = serde_json::to_value(&couch).unwrap();
        assert_eq!(json["_id"], format!("tournament::{id}"));
        assert_eq!(json["_rev"], "1-abc");
        assert_eq!(json["createdAt"], 3);
        assert_eq!(json["data"]["lastUpdated"], 3);

        let back: CouchTournamentDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.envelope.data.id, id);
    }
}
