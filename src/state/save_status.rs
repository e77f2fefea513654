use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Persistence status shown to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// Nothing pending.
    #[default]
    Idle,
    /// A write is queued or in flight.
    Saving,
    /// The latest write reached the store.
    Saved,
    /// The latest write or sync failed.
    Error,
}

/// Events driving [`SaveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    /// A local mutation was applied and a write scheduled.
    MutationQueued,
    /// A manual sync began.
    SyncStarted,
    /// The store accepted a write.
    WriteSucceeded,
    /// The store rejected a write or could not be reached.
    WriteFailed,
    /// The "saved" indicator timed out.
    SavedExpired,
}

/// Error returned when an event does not apply to the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid save status transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidSaveTransition {
    /// Status when the event arrived.
    pub from: SaveStatus,
    /// Rejected event.
    pub event: SaveEvent,
}

impl SaveStatus {
    /// Compute the status following `event`.
    pub fn on(self, event: SaveEvent) -> Result<SaveStatus, InvalidSaveTransition> {
        let next = match (self, event) {
            (_, SaveEvent::MutationQueued | SaveEvent::SyncStarted) => SaveStatus::Saving,
            (SaveStatus::Saving | SaveStatus::Error, SaveEvent::WriteSucceeded) => {
                SaveStatus::Saved
            }
            (_, SaveEvent::WriteFailed) => SaveStatus::Error,
            (SaveStatus::Saved, SaveEvent::SavedExpired) => SaveStatus::Idle,
            (from, event) => return Err(InvalidSaveTransition { from, event }),
        };
        Ok(next)
    }
}
