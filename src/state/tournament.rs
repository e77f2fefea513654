use std::{
    collections::HashSet,
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::player_map;

/// Logical timestamp expressed in milliseconds since the Unix epoch.
pub type Timestamp = u64;
/// Identifier of a player inside a tournament document.
pub type PlayerId = u32;
/// Identifier of a schedule entry inside a tournament document.
pub type EntryId = u32;

/// Label given to pauses created without an explicit one.
pub const DEFAULT_PAUSE_LABEL: &str = "Break";
/// Duration used for entries persisted without a usable duration.
pub const DEFAULT_ENTRY_MINUTES: u32 = 15;
/// Name given to tournaments created without an explicit one.
pub const DEFAULT_TOURNAMENT_NAME: &str = "New tournament";

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// Next logical timestamp after `previous`, never going backwards even when
/// the wall clock does (or when two mutations land in the same millisecond).
pub fn next_timestamp(previous: Timestamp, now: Timestamp) -> Timestamp {
    now.max(previous.saturating_add(1))
}

/// Blind structure of a level or the label of a pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EntryKind {
    /// A timed blind level.
    #[serde(rename_all = "camelCase")]
    Level {
        /// Small blind amount.
        small_blind: u64,
        /// Big blind amount.
        big_blind: u64,
        /// Ante paid by every player.
        ante: u64,
    },
    /// A timed break between levels.
    Pause {
        /// Display label of the break.
        label: String,
    },
}

/// One row of the blind schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Unique positive identifier; the schedule is kept sorted by it.
    pub id: EntryId,
    /// Length of the entry in minutes (strictly positive).
    pub duration_minutes: u32,
    /// Level blinds or pause label.
    #[serde(flatten)]
    pub kind: EntryKind,
}

impl ScheduleEntry {
    /// Build a blind level entry.
    pub fn level(id: EntryId, small_blind: u64, big_blind: u64, ante: u64, minutes: u32) -> Self {
        Self {
            id,
            duration_minutes: minutes,
            kind: EntryKind::Level {
                small_blind,
                big_blind,
                ante,
            },
        }
    }

    /// Build a pause entry.
    pub fn pause(id: EntryId, label: impl Into<String>, minutes: u32) -> Self {
        Self {
            id,
            duration_minutes: minutes,
            kind: EntryKind::Pause {
                label: label.into(),
            },
        }
    }

    /// Full duration of the entry in seconds.
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// Whether the entry is a break rather than a blind level.
    pub fn is_pause(&self) -> bool {
        matches!(self.kind, EntryKind::Pause { .. })
    }
}

/// Chip and fee defaults applied to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Economics {
    /// Starting stack granted on entry.
    pub initial_chips: u64,
    /// Chips granted per rebuy.
    pub rebuy_chips: u64,
    /// Chips granted per add-on.
    pub addon_chips: u64,
    /// Price of the entry.
    pub entry_fee: u64,
    /// Price of one rebuy.
    pub rebuy_fee: u64,
    /// Price of one add-on.
    pub addon_fee: u64,
}

impl Default for Economics {
    fn default() -> Self {
        Self {
            initial_chips: 10_000,
            rebuy_chips: 10_000,
            addon_chips: 15_000,
            entry_fee: 1_000,
            rebuy_fee: 1_000,
            addon_fee: 1_500,
        }
    }
}

/// A registered player and their running ledger.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Player {
    /// Unique positive identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Starting stack, copied from the document default when the player joined.
    pub initial_chips: u64,
    /// Number of rebuys taken.
    pub rebuys: u32,
    /// Number of add-ons taken.
    pub addons: u32,
    /// Whether the player is out of the tournament.
    pub is_eliminated: bool,
    /// Dense elimination rank, present only while eliminated.
    pub elimination_order: Option<u32>,
    /// Bounty chips collected.
    pub bounty_chips: u64,
    /// Money already paid by the player.
    pub paid_amount: u64,
}

impl Player {
    /// Fresh player entering with `initial_chips`.
    pub fn new(id: PlayerId, name: String, initial_chips: u64) -> Self {
        Self {
            id,
            name,
            initial_chips,
            rebuys: 0,
            addons: 0,
            is_eliminated: false,
            elimination_order: None,
            bounty_chips: 0,
            paid_amount: 0,
        }
    }
}

/// Template used to create new tournament documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentTemplate {
    /// Name given to new tournaments.
    pub name: String,
    /// Initial blind schedule.
    pub schedule: Vec<ScheduleEntry>,
    /// Initial chip and fee settings.
    pub economics: Economics,
}

impl Default for TournamentTemplate {
    fn default() -> Self {
        let levels = [
            (25, 50, 0),
            (50, 100, 0),
            (75, 150, 0),
            (100, 200, 25),
            (150, 300, 25),
            (200, 400, 50),
            (300, 600, 75),
            (400, 800, 100),
            (500, 1_000, 125),
            (700, 1_400, 150),
        ];

        Self {
            name: DEFAULT_TOURNAMENT_NAME.to_string(),
            schedule: levels
                .into_iter()
                .zip(1..)
                .map(|((small, big, ante), id)| {
                    ScheduleEntry::level(id, small, big, ante, DEFAULT_ENTRY_MINUTES)
                })
                .collect(),
            economics: Economics::default(),
        }
    }
}

/// The single shared tournament record synchronized across observers.
///
/// Values of this type are only ever replaced, never edited in place by the
/// controller: every transition clones the current document, edits the copy
/// and stamps a fresh `last_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", from = "RawTournamentDocument")]
pub struct TournamentDocument {
    /// Opaque identifier assigned at creation.
    pub id: Uuid,
    /// Display label.
    pub name: String,
    /// Ordered list of levels and pauses.
    pub schedule: Vec<ScheduleEntry>,
    /// Index of the running entry in `schedule`.
    pub current_entry_index: usize,
    /// Seconds left in the running entry.
    pub time_remaining_seconds: u64,
    /// Whether the clock is counting down.
    pub is_running: bool,
    /// Players keyed by id, in registration order.
    #[serde(with = "player_map")]
    #[schema(value_type = Vec<Player>)]
    pub players: IndexMap<PlayerId, Player>,
    /// Chip and fee defaults.
    #[serde(flatten)]
    pub economics: Economics,
    /// Number of currently eliminated players (highest assigned order).
    pub elimination_count: u32,
    /// Optional background image payload.
    pub background_image: Option<String>,
    /// Optional club logo payload.
    pub club_logo: Option<String>,
    /// Logical timestamp of the latest mutation.
    pub last_updated: Timestamp,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

impl TournamentDocument {
    /// Create a brand new document from `template`, stamped at `now`.
    pub fn from_template(template: &TournamentTemplate, now: Timestamp) -> Self {
        let time_remaining_seconds = template
            .schedule
            .first()
            .map(ScheduleEntry::duration_seconds)
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            name: template.name.clone(),
            schedule: template.schedule.clone(),
            current_entry_index: 0,
            time_remaining_seconds,
            is_running: false,
            players: IndexMap::new(),
            economics: template.economics,
            elimination_count: 0,
            background_image: None,
            club_logo: None,
            last_updated: now,
            created_at: now,
        }
    }

    /// Entry the clock is currently running.
    pub fn current_entry(&self) -> Option<&ScheduleEntry> {
        self.schedule.get(self.current_entry_index)
    }

    /// Entry following the running one, if any.
    pub fn upcoming_entry(&self) -> Option<&ScheduleEntry> {
        self.schedule.get(self.current_entry_index + 1)
    }

    /// Whether this copy should replace `other` under last-write-wins.
    pub fn is_newer_than(&self, other: &TournamentDocument) -> bool {
        self.last_updated > other.last_updated
    }
}

/// Loose shape accepted from storage and caches before validation.
///
/// Every field is optional so partially written or older documents still
/// load; [`TournamentDocument`] is only ever built through the `From`
/// conversion below.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTournamentDocument {
    id: Option<Uuid>,
    name: Option<String>,
    #[serde(alias = "levels")]
    schedule: Option<Vec<RawScheduleEntry>>,
    #[serde(alias = "currentLevelIndex")]
    current_entry_index: Option<usize>,
    #[serde(alias = "timeRemaining")]
    time_remaining_seconds: Option<u64>,
    is_running: Option<bool>,
    #[serde(with = "player_map")]
    players: IndexMap<PlayerId, Player>,
    initial_chips: Option<u64>,
    rebuy_chips: Option<u64>,
    addon_chips: Option<u64>,
    entry_fee: Option<u64>,
    rebuy_fee: Option<u64>,
    addon_fee: Option<u64>,
    elimination_count: Option<u32>,
    background_image: Option<String>,
    club_logo: Option<String>,
    last_updated: Option<Timestamp>,
    created_at: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScheduleEntry {
    id: EntryId,
    #[serde(default, alias = "duration")]
    duration_minutes: u32,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    small_blind: u64,
    #[serde(default)]
    big_blind: u64,
    #[serde(default)]
    ante: u64,
    #[serde(default, alias = "name")]
    label: Option<String>,
}

impl From<RawScheduleEntry> for ScheduleEntry {
    fn from(raw: RawScheduleEntry) -> Self {
        let minutes = if raw.duration_minutes == 0 {
            DEFAULT_ENTRY_MINUTES
        } else {
            raw.duration_minutes
        };

        match raw.kind.as_deref() {
            Some("pause") => ScheduleEntry::pause(
                raw.id,
                raw.label
                    .filter(|label| !label.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PAUSE_LABEL.to_string()),
                minutes,
            ),
            _ => ScheduleEntry::level(raw.id, raw.small_blind, raw.big_blind, raw.ante, minutes),
        }
    }
}

impl From<RawTournamentDocument> for TournamentDocument {
    fn from(raw: RawTournamentDocument) -> Self {
        let defaults = Economics::default();
        let now = now_millis();

        let raw_schedule = raw.schedule.unwrap_or_else(|| {
            TournamentTemplate::default()
                .schedule
                .into_iter()
                .map(RawScheduleEntry::from)
                .collect()
        });

        let mut schedule: Vec<ScheduleEntry> = Vec::new();
        let mut seen_entries = HashSet::new();
        for entry in raw_schedule {
            let entry = ScheduleEntry::from(entry);
            if entry.id == 0 || !seen_entries.insert(entry.id) {
                warn!(entry_id = entry.id, "dropping schedule entry with invalid or duplicate id");
                continue;
            }
            schedule.push(entry);
        }
        schedule.sort_by_key(|entry| entry.id);

        let current_entry_index = raw
            .current_entry_index
            .unwrap_or_default()
            .min(schedule.len().saturating_sub(1));

        let entry_seconds = schedule
            .get(current_entry_index)
            .map(ScheduleEntry::duration_seconds)
            .unwrap_or_default();
        let time_remaining_seconds = match raw.time_remaining_seconds {
            Some(stored) if stored > entry_seconds => {
                warn!(stored, entry_seconds, "remaining time exceeds the current entry; clamped");
                entry_seconds
            }
            Some(stored) => stored,
            None => entry_seconds,
        };

        let mut players = raw.players;
        let elimination_count = densify_elimination_orders(&mut players);
        if raw.elimination_count.is_some_and(|count| count != elimination_count) {
            warn!(
                stored = raw.elimination_count,
                recomputed = elimination_count,
                "elimination count out of sync; recomputed from players"
            );
        }

        let created_at = raw.created_at.unwrap_or(now);

        Self {
            id: raw.id.unwrap_or_else(Uuid::new_v4),
            name: raw
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOURNAMENT_NAME.to_string()),
            schedule,
            current_entry_index,
            time_remaining_seconds,
            is_running: raw.is_running.unwrap_or(false),
            players,
            economics: Economics {
                initial_chips: raw.initial_chips.unwrap_or(defaults.initial_chips),
                rebuy_chips: raw.rebuy_chips.unwrap_or(defaults.rebuy_chips),
                addon_chips: raw.addon_chips.unwrap_or(defaults.addon_chips),
                entry_fee: raw.entry_fee.unwrap_or(defaults.entry_fee),
                rebuy_fee: raw.rebuy_fee.unwrap_or(defaults.rebuy_fee),
                addon_fee: raw.addon_fee.unwrap_or(defaults.addon_fee),
            },
            elimination_count,
            background_image: raw.background_image,
            club_logo: raw.club_logo,
            last_updated: raw.last_updated.unwrap_or(created_at),
            created_at,
        }
    }
}

impl From<ScheduleEntry> for RawScheduleEntry {
    fn from(entry: ScheduleEntry) -> Self {
        let (kind, small_blind, big_blind, ante, label) = match entry.kind {
            EntryKind::Level {
                small_blind,
                big_blind,
                ante,
            } => ("level", small_blind, big_blind, ante, None),
            EntryKind::Pause { label } => ("pause", 0, 0, 0, Some(label)),
        };
        Self {
            id: entry.id,
            duration_minutes: entry.duration_minutes,
            kind: Some(kind.to_string()),
            small_blind,
            big_blind,
            ante,
            label,
        }
    }
}

/// Renumber elimination orders so eliminated players rank `1..=n` with no
/// gaps, keeping their relative order. Returns `n`.
fn densify_elimination_orders(players: &mut IndexMap<PlayerId, Player>) -> u32 {
    let mut eliminated: Vec<(u32, PlayerId)> = players
        .values()
        .filter(|player| player.is_eliminated)
        .map(|player| (player.elimination_order.unwrap_or(u32::MAX), player.id))
        .collect();
    eliminated.sort();

    for player in players.values_mut().filter(|player| !player.is_eliminated) {
        player.elimination_order = None;
    }

    let mut rank = 0;
    for (_, id) in eliminated {
        rank += 1;
        if let Some(player) = players.get_mut(&id) {
            player.elimination_order = Some(rank);
        }
    }
    rank
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn next_timestamp_is_strictly_increasing() {
        assert_eq!(next_timestamp(100, 500), 500);
        assert_eq!(next_timestamp(500, 500), 501);
        assert_eq!(next_timestamp(900, 500), 901);
    }

    #[test]
    fn template_document_starts_on_first_level() {
        let doc = TournamentDocument::from_template(&TournamentTemplate::default(), 42);
        assert_eq!(doc.schedule.len(), 10);
        assert_eq!(doc.current_entry_index, 0);
        assert_eq!(doc.time_remaining_seconds, 15 * 60);
        assert!(!doc.is_running);
        assert_eq!(doc.last_updated, 42);
        assert_eq!(doc.created_at, 42);
    }

    #[test]
    fn serialized_document_reads_back_identically() {
        let mut doc = TournamentDocument::from_template(&TournamentTemplate::default(), 7);
        doc.schedule.push(ScheduleEntry::pause(11, "Dinner", 30));
        doc.players.insert(1, Player::new(1, "Alice".into(), 10_000));
        doc.club_logo = Some("data:image/png;base64,AAAA".into());

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["players"][0]["name"], "Alice");
        assert_eq!(json["schedule"][10]["type"], "pause");
        assert_eq!(json["initialChips"], 10_000);

        let back: TournamentDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn boundary_fills_defaults_for_sparse_documents() {
        let doc: TournamentDocument = serde_json::from_value(json!({
            "name": "Friday",
            "lastUpdated": 10
        }))
        .unwrap();

        assert_eq!(doc.name, "Friday");
        assert_eq!(doc.schedule.len(), 10);
        assert_eq!(doc.economics, Economics::default());
        assert_eq!(doc.last_updated, 10);
        assert!(doc.players.is_empty());
    }

    #[test]
    fn boundary_accepts_legacy_field_names_and_clamps_index() {
        let doc: TournamentDocument = serde_json::from_value(json!({
            "levels": [
                { "id": 2, "type": "level", "smallBlind": 50, "bigBlind": 100, "ante": 0, "duration": 20 },
                { "id": 1, "type": "pause", "name": "Smoke", "duration": 0 }
            ],
            "currentLevelIndex": 9,
            "timeRemaining": 30
        }))
        .unwrap();

        assert_eq!(doc.schedule[0], ScheduleEntry::pause(1, "Smoke", DEFAULT_ENTRY_MINUTES));
        assert_eq!(doc.schedule[1], ScheduleEntry::level(2, 50, 100, 0, 20));
        assert_eq!(doc.current_entry_index, 1);
        assert_eq!(doc.time_remaining_seconds, 30);
    }

    #[test]
    fn boundary_clamps_remaining_time_and_drops_player_zero() {
        let doc: TournamentDocument = serde_json::from_value(json!({
            "schedule": [
                { "id": 1, "type": "level", "smallBlind": 25, "bigBlind": 50, "durationMinutes": 10 }
            ],
            "timeRemainingSeconds": 5_000,
            "players": [Player::new(0, "Ghost".into(), 100), Player::new(1, "A".into(), 100)]
        }))
        .unwrap();

        assert_eq!(doc.time_remaining_seconds, 600);
        let ids: Vec<_> = doc.players.keys().copied().collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn boundary_redensifies_elimination_orders() {
        let mut first = Player::new(1, "A".into(), 100);
        first.is_eliminated = true;
        first.elimination_order = Some(3);
        let mut second = Player::new(2, "B".into(), 100);
        second.is_eliminated = true;
        second.elimination_order = Some(7);
        let mut third = Player::new(3, "C".into(), 100);
        third.elimination_order = Some(1);

        let doc: TournamentDocument = serde_json::from_value(json!({
            "players": [first, second, third, Player::new(3, "dup".into(), 1)],
            "eliminationCount": 9
        }))
        .unwrap();

        assert_eq!(doc.players.len(), 3);
        assert_eq!(doc.elimination_count, 2);
        assert_eq!(doc.players[&1].elimination_order, Some(1));
        assert_eq!(doc.players[&2].elimination_order, Some(2));
        assert_eq!(doc.players[&3].elimination_order, None);
    }
}
