use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        sse::{SaveStatusEvent, ServerEvent, SystemStatus},
        tournament::TournamentView,
    },
    state::{SharedState, SseHub, save_status::SaveStatus, tournament::TournamentDocument},
};

/// Full view sent to a client when it subscribes.
pub const EVENT_TOURNAMENT_SNAPSHOT: &str = "tournament.snapshot";
/// Full view sent after every change to the document.
pub const EVENT_TOURNAMENT_UPDATED: &str = "tournament.updated";
pub const EVENT_SAVE_STATUS: &str = "save.status";
pub const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the new canonical document with its derived figures.
pub fn broadcast_tournament_updated(state: &SharedState, document: &TournamentDocument) {
    let payload = TournamentView::from(document.clone());
    send_public_event(state, EVENT_TOURNAMENT_UPDATED, &payload);
}

/// Broadcast a persistence status change.
pub fn broadcast_save_status(state: &SharedState, status: SaveStatus) {
    send_public_event(state, EVENT_SAVE_STATUS, &SaveStatusEvent { status });
}

/// Broadcast that the backend entered or left degraded mode.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    send_event(hub, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Initial event for a freshly connected observer.
pub async fn snapshot_event(state: &SharedState) -> Option<ServerEvent> {
    let payload = TournamentView::from(state.document().await);
    match ServerEvent::json(Some(EVENT_TOURNAMENT_SNAPSHOT.to_string()), &payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize tournament snapshot");
            None
        }
    }
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    send_event(state.sse(), event, payload);
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
