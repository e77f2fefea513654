use thiserror::Error;

use crate::state::{
    clock, roster, schedule, settings,
    tournament::{EntryId, PlayerId, Timestamp, TournamentDocument, next_timestamp},
};

/// Direction of a manual schedule step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to the following entry.
    Next,
    /// Move back to the preceding entry.
    Previous,
}

/// Kind requested when creating or editing a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Blind level.
    Level,
    /// Break.
    Pause,
}

/// Partial schedule entry; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    /// Switch the entry to another kind.
    pub kind: Option<EntryType>,
    /// New length in minutes.
    pub duration_minutes: Option<u32>,
    /// New small blind.
    pub small_blind: Option<u64>,
    /// New big blind.
    pub big_blind: Option<u64>,
    /// New ante.
    pub ante: Option<u64>,
    /// New pause label.
    pub label: Option<String>,
}

/// Partial economics update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EconomicsPatch {
    /// Chips handed out with the buy-in.
    pub initial_chips: Option<u64>,
    /// Chips per rebuy.
    pub rebuy_chips: Option<u64>,
    /// Chips per add-on.
    pub addon_chips: Option<u64>,
    /// Buy-in price.
    pub entry_fee: Option<u64>,
    /// Rebuy price.
    pub rebuy_fee: Option<u64>,
    /// Add-on price.
    pub addon_fee: Option<u64>,
}

/// Branding update. The outer option selects the field, the inner one
/// distinguishes "set" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandingPatch {
    /// Image shown behind the clock.
    pub background_image: Option<Option<String>>,
    /// Logo shown next to the tournament name.
    pub club_logo: Option<Option<String>>,
}

/// Every change the controller can apply to the canonical document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Start the countdown.
    StartClock,
    /// Freeze the countdown.
    PauseClock,
    /// Stop and rewind to the first entry.
    ResetClock,
    /// Jump to the neighbouring entry.
    AdvanceEntry(Step),
    /// Whole seconds elapsed on a running clock.
    Tick { seconds: u64 },
    /// Register a player who paid the buy-in.
    AddPlayer { name: String },
    /// Drop a player from the ledger.
    RemovePlayer { id: PlayerId },
    /// Change a player's display name.
    RenamePlayer { id: PlayerId, name: String },
    /// Record one rebuy.
    AddRebuy { id: PlayerId },
    /// Record one add-on.
    AddAddon { id: PlayerId },
    /// Knock a player out at the next finishing position.
    EliminatePlayer { id: PlayerId },
    /// Bring an eliminated player back.
    RevivePlayer { id: PlayerId },
    /// Credit bounty chips won by a player.
    AddBountyChips { id: PlayerId, amount: u64 },
    /// Record money received from a player.
    RecordPayment { id: PlayerId, amount: u64 },
    /// Put every eliminated player back in play.
    ResetEliminations,
    /// Append an entry to the schedule.
    AddEntry(EntryPatch),
    /// Edit one schedule entry.
    UpdateEntry { id: EntryId, patch: EntryPatch },
    /// Delete one schedule entry.
    RemoveEntry { id: EntryId },
    /// Change chip counts and prices.
    UpdateEconomics(EconomicsPatch),
    /// Change the display label.
    RenameTournament { name: String },
    /// Set or clear branding images.
    UpdateBranding(BrandingPatch),
}

impl Mutation {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::StartClock => "clock.start",
            Mutation::PauseClock => "clock.pause",
            Mutation::ResetClock => "clock.reset",
            Mutation::AdvanceEntry(Step::Next) => "clock.next",
            Mutation::AdvanceEntry(Step::Previous) => "clock.previous",
            Mutation::Tick { .. } => "clock.tick",
            Mutation::AddPlayer { .. } => "player.add",
            Mutation::RemovePlayer { .. } => "player.remove",
            Mutation::RenamePlayer { .. } => "player.rename",
            Mutation::AddRebuy { .. } => "player.rebuy",
            Mutation::AddAddon { .. } => "player.addon",
            Mutation::EliminatePlayer { .. } => "player.eliminate",
            Mutation::RevivePlayer { .. } => "player.revive",
            Mutation::AddBountyChips { .. } => "player.bounty",
            Mutation::RecordPayment { .. } => "player.payment",
            Mutation::ResetEliminations => "players.reset_eliminations",
            Mutation::AddEntry(_) => "schedule.add",
            Mutation::UpdateEntry { .. } => "schedule.update",
            Mutation::RemoveEntry { .. } => "schedule.remove",
            Mutation::UpdateEconomics(_) => "settings.economics",
            Mutation::RenameTournament { .. } => "settings.rename",
            Mutation::UpdateBranding(_) => "settings.branding",
        }
    }
}

/// Reason a mutation left the document untouched.
///
/// Rejections are diagnostics, not failures: the caller keeps the previous
/// document and reports the reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("the schedule is empty")]
    EmptySchedule,
    #[error("the clock is already running")]
    AlreadyRunning,
    #[error("the clock is not running")]
    NotRunning,
    #[error("the clock has run out on the last entry; reset it first")]
    ClockExhausted,
    #[error("already at the {0} entry of the schedule")]
    ScheduleBoundary(&'static str),
    #[error("name must not be empty")]
    EmptyName,
    #[error("player {0} does not exist")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is already eliminated")]
    AlreadyEliminated(PlayerId),
    #[error("player {0} is not eliminated")]
    NotEliminated(PlayerId),
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("amount is out of range")]
    OutOfRange,
    #[error("schedule entry {0} does not exist")]
    UnknownEntry(EntryId),
    #[error("invalid schedule entry: {0}")]
    InvalidEntry(&'static str),
    #[error("nothing to change")]
    EmptyPatch,
}

impl TournamentDocument {
    /// Apply `mutation` to a copy of this document.
    ///
    /// On success the copy carries a `last_updated` strictly greater than the
    /// current one. The receiver is never modified.
    pub fn apply(
        &self,
        mutation: &Mutation,
        now: Timestamp,
    ) -> Result<TournamentDocument, Rejection> {
        let mut next = self.clone();

        match mutation {
            Mutation::StartClock => clock::start(&mut next)?,
            Mutation::PauseClock => clock::pause(&mut next)?,
            Mutation::ResetClock => clock::reset(&mut next)?,
            Mutation::AdvanceEntry(step) => clock::advance_entry(&mut next, *step)?,
            Mutation::Tick { seconds } => clock::tick(&mut next, *seconds)?,
            Mutation::AddPlayer { name } => roster::add_player(&mut next, name)?,
            Mutation::RemovePlayer { id } => roster::remove_player(&mut next, *id)?,
            Mutation::RenamePlayer { id, name } => roster::rename_player(&mut next, *id, name)?,
            Mutation::AddRebuy { id } => roster::add_rebuy(&mut next, *id)?,
            Mutation::AddAddon { id } => roster::add_addon(&mut next, *id)?,
            Mutation::EliminatePlayer { id } => roster::eliminate(&mut next, *id)?,
            Mutation::RevivePlayer { id } => roster::revive(&mut next, *id)?,
            Mutation::AddBountyChips { id, amount } => {
                roster::add_bounty_chips(&mut next, *id, *amount)?
            }
            Mutation::RecordPayment { id, amount } => {
                roster::record_payment(&mut next, *id, *amount)?
            }
            Mutation::ResetEliminations => roster::reset_eliminations(&mut next),
            Mutation::AddEntry(patch) => schedule::add_entry(&mut next, patch)?,
            Mutation::UpdateEntry { id, patch } => schedule::update_entry(&mut next, *id, patch)?,
            Mutation::RemoveEntry { id } => schedule::remove_entry(&mut next, *id)?,
            Mutation::UpdateEconomics(patch) => settings::update_economics(&mut next, patch)?,
            Mutation::RenameTournament { name } => settings::rename(&mut next, name)?,
            Mutation::UpdateBranding(patch) => settings::update_branding(&mut next, patch)?,
        }

        next.last_updated = next_timestamp(self.last_updated, now);
        Ok(next)
    }
}
