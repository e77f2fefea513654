//! DTO definitions used by the tournament REST API and the SSE stream.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::state::{
    mutation::{BrandingPatch, EconomicsPatch, EntryPatch, EntryType},
    save_status::SaveStatus,
    stats::{RankedPlayer, TournamentStats, ranking},
    tournament::{Timestamp, TournamentDocument},
};

/// Full document plus everything derived from it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TournamentView {
    /// Canonical document.
    pub document: TournamentDocument,
    /// Figures derived from the document.
    pub stats: TournamentStats,
    /// Players ordered by stack.
    pub ranking: Vec<RankedPlayer>,
}

impl From<TournamentDocument> for TournamentView {
    fn from(document: TournamentDocument) -> Self {
        Self {
            stats: TournamentStats::of(&document),
            ranking: ranking(&document),
            document,
        }
    }
}

/// Response of every mutating endpoint.
///
/// A rejected change still answers 200 with the unchanged document and the
/// reason in `warning`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TournamentResponse {
    #[serde(flatten)]
    pub view: TournamentView,
    /// Why the change was not applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Lightweight status used by displays polling for the clock.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Persistence state of the local document.
    pub save_status: SaveStatus,
    /// Whether the store is unreachable.
    pub degraded: bool,
    /// Whether the clock is counting down.
    pub is_running: bool,
    /// Index of the running schedule entry.
    pub current_entry_index: usize,
    /// Seconds left in the running entry.
    pub time_remaining_seconds: u64,
    /// Stamp of the last applied change.
    pub last_updated: Timestamp,
}

impl StatusResponse {
    /// Snapshot the clock fields of `document`.
    pub fn new(document: &TournamentDocument, save_status: SaveStatus, degraded: bool) -> Self {
        Self {
            save_status,
            degraded,
            is_running: document.is_running,
            current_entry_index: document.current_entry_index,
            time_remaining_seconds: document.time_remaining_seconds,
            last_updated: document.last_updated,
        }
    }
}

/// Largest chip count or money amount accepted from callers.
pub const MAX_AMOUNT: u64 = 1_000_000_000_000;

/// Largest branding payload, sized for data URLs of real images.
pub const MAX_IMAGE_LEN: u64 = 5 * 1024 * 1024;

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must contain a non-whitespace character".into());
        return Err(err);
    }
    Ok(())
}

/// Payload used to register a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerNameRequest {
    /// Display name, trimmed before use.
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Chip amount for a bounty.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BountyRequest {
    /// Chips won.
    #[validate(range(min = 1, max = MAX_AMOUNT))]
    pub amount: u64,
}

/// What to do when a payment exceeds the outstanding balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Refuse with the outstanding balance so the caller can confirm.
    #[default]
    Confirm,
    /// Record only what is owed.
    Cap,
    /// Record the full amount.
    Accept,
}

/// Money received from a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PaymentRequest {
    /// Money received.
    #[validate(range(min = 1, max = MAX_AMOUNT))]
    pub amount: u64,
    /// Handling of an amount above the balance.
    #[serde(default)]
    pub policy: OverpaymentPolicy,
}

/// Entry kind accepted by the schedule endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryTypeDto {
    /// Blind level.
    Level,
    /// Break.
    Pause,
}

impl From<EntryTypeDto> for EntryType {
    fn from(value: EntryTypeDto) -> Self {
        match value {
            EntryTypeDto::Level => EntryType::Level,
            EntryTypeDto::Pause => EntryType::Pause,
        }
    }
}

/// Schedule entry fields; omitted fields keep their value (or default on creation).
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_blinds"))]
pub struct EntryRequest {
    /// `level` or `pause`.
    #[serde(default, rename = "type")]
    pub kind: Option<EntryTypeDto>,
    /// Length in minutes.
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<u32>,
    /// Small blind of a level.
    #[validate(range(max = MAX_AMOUNT))]
    pub small_blind: Option<u64>,
    /// Big blind of a level.
    #[validate(range(max = MAX_AMOUNT))]
    pub big_blind: Option<u64>,
    /// Ante of a level.
    #[validate(range(max = MAX_AMOUNT))]
    pub ante: Option<u64>,
    /// Label of a pause.
    #[validate(length(max = 64))]
    pub label: Option<String>,
}

fn validate_blinds(request: &EntryRequest) -> Result<(), ValidationError> {
    match (request.small_blind, request.big_blind) {
        (Some(small), Some(big)) if small > big => {
            let mut err = ValidationError::new("blinds_order");
            err.message = Some("small blind must not exceed big blind".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl From<EntryRequest> for EntryPatch {
    fn from(value: EntryRequest) -> Self {
        Self {
            kind: value.kind.map(Into::into),
            duration_minutes: value.duration_minutes,
            small_blind: value.small_blind,
            big_blind: value.big_blind,
            ante: value.ante,
            label: value.label,
        }
    }
}

/// Tournament name and chip/fee settings.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct SettingsRequest {
    /// Display label.
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    /// Chips handed out with the buy-in.
    #[validate(range(max = MAX_AMOUNT))]
    pub initial_chips: Option<u64>,
    /// Chips per rebuy.
    #[validate(range(max = MAX_AMOUNT))]
    pub rebuy_chips: Option<u64>,
    /// Chips per add-on.
    #[validate(range(max = MAX_AMOUNT))]
    pub addon_chips: Option<u64>,
    /// Buy-in price.
    #[validate(range(max = MAX_AMOUNT))]
    pub entry_fee: Option<u64>,
    /// Rebuy price.
    #[validate(range(max = MAX_AMOUNT))]
    pub rebuy_fee: Option<u64>,
    /// Add-on price.
    #[validate(range(max = MAX_AMOUNT))]
    pub addon_fee: Option<u64>,
}

impl SettingsRequest {
    /// Economics part of the request, `None` when no economics field is set.
    pub fn economics(&self) -> Option<EconomicsPatch> {
        let patch = EconomicsPatch {
            initial_chips: self.initial_chips,
            rebuy_chips: self.rebuy_chips,
            addon_chips: self.addon_chips,
            entry_fee: self.entry_fee,
            rebuy_fee: self.rebuy_fee,
            addon_fee: self.addon_fee,
        };
        (patch != EconomicsPatch::default()).then_some(patch)
    }
}

/// Display images. Omit a field to keep it, send `null` to clear it.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct BrandingRequest {
    /// Image shown behind the clock, usually a data URL.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = MAX_IMAGE_LEN))]
    pub background_image: Option<Option<String>>,
    /// Club logo, usually a data URL.
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = MAX_IMAGE_LEN))]
    pub club_logo: Option<Option<String>>,
}

impl From<BrandingRequest> for BrandingPatch {
    fn from(value: BrandingRequest) -> Self {
        Self {
            background_image: value.background_image,
            club_logo: value.club_logo,
        }
    }
}

/// Payload used to start a new tournament.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateTournamentRequest {
    /// Display label; the template name when omitted.
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
}

/// Which side won a manual sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The local copy was the newest and now sits in the store.
    Pushed,
    /// The store held a newer copy which replaced the local one.
    Pulled,
}

/// Result of `POST /tournament/sync`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    /// Which side won.
    pub outcome: SyncOutcome,
    #[serde(flatten)]
    pub view: TournamentView,
}
