//! Read-only figures derived from a tournament document.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::tournament::{Economics, Player, PlayerId, ScheduleEntry, TournamentDocument};

/// Chips and money owed by one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerLedger {
    /// Stack from entry, rebuys and add-ons.
    pub total_chips: u64,
    /// Price of entry, rebuys and add-ons.
    pub total_cost: u64,
    /// Outstanding balance, never negative.
    pub owed: u64,
}

impl PlayerLedger {
    /// Compute the ledger of `player` under `economics`.
    pub fn of(player: &Player, economics: &Economics) -> Self {
        let rebuys = u64::from(player.rebuys);
        let addons = u64::from(player.addons);
        let total_chips = player
            .initial_chips
            .saturating_add(rebuys.saturating_mul(economics.rebuy_chips))
            .saturating_add(addons.saturating_mul(economics.addon_chips));
        let total_cost = economics
            .entry_fee
            .saturating_add(rebuys.saturating_mul(economics.rebuy_fee))
            .saturating_add(addons.saturating_mul(economics.addon_fee));

        Self {
            total_chips,
            total_cost,
            owed: total_cost.saturating_sub(player.paid_amount),
        }
    }
}

/// One row of the chip ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RankedPlayer {
    /// 1-based position.
    pub rank: usize,
    /// Player identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Stack used for the ranking.
    pub total_chips: u64,
    /// Whether the player is out.
    pub is_eliminated: bool,
}

/// Tournament-wide figures shown next to the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TournamentStats {
    /// Registered players, eliminated ones included.
    pub entries: usize,
    /// Rebuys across all players.
    pub total_rebuys: u64,
    /// Add-ons across all players.
    pub total_addons: u64,
    /// Entry fees plus every rebuy and add-on paid for.
    pub prize_pool: u64,
    /// Every stack bought so far. Bounty chips are not counted.
    pub chips_in_play: u64,
    /// Players not eliminated.
    pub active_players: usize,
    /// Chips in play spread over the active players, rounded.
    pub average_stack: u64,
    /// Entry the clock is on.
    pub current_entry: Option<ScheduleEntry>,
    /// Entry after the current one.
    pub upcoming_entry: Option<ScheduleEntry>,
}

impl TournamentStats {
    /// Derive the statistics of `doc`.
    pub fn of(doc: &TournamentDocument) -> Self {
        let economics = &doc.economics;
        let entries = doc.players.len();
        let total_rebuys: u64 = doc.players.values().map(|p| u64::from(p.rebuys)).sum();
        let total_addons: u64 = doc.players.values().map(|p| u64::from(p.addons)).sum();
        let prize_pool = (entries as u64)
            .saturating_mul(economics.entry_fee)
            .saturating_add(total_rebuys.saturating_mul(economics.rebuy_fee))
            .saturating_add(total_addons.saturating_mul(economics.addon_fee));

        let chips_in_play = doc
            .players
            .values()
            .map(|player| PlayerLedger::of(player, economics).total_chips)
            .fold(0u64, u64::saturating_add);
        let active_players = doc.players.values().filter(|p| !p.is_eliminated).count();

        let average_stack = match active_players as u64 {
            0 => 0,
            n => chips_in_play / n + u64::from(chips_in_play % n >= n.div_ceil(2)),
        };

        Self {
            entries,
            total_rebuys,
            total_addons,
            prize_pool,
            chips_in_play,
            active_players,
            average_stack,
            current_entry: doc.current_entry().cloned(),
            upcoming_entry: doc.upcoming_entry().cloned(),
        }
    }
}

/// Players ordered by stack, largest first; ties keep registration order.
pub fn ranking(doc: &TournamentDocument) -> Vec<RankedPlayer> {
    let mut rows: Vec<_> = doc
        .players
        .values()
        .map(|player| (player, PlayerLedger::of(player, &doc.economics).total_chips))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    rows.into_iter()
        .enumerate()
        .map(|(index, (player, total_chips))| RankedPlayer {
            rank: index + 1,
            player_id: player.id,
            name: player.name.clone(),
            total_chips,
            is_eliminated: player.is_eliminated,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        mutation::Mutation,
        tournament::{TournamentTemplate, now_millis},
    };

    fn populated() -> TournamentDocument {
        let script = [
            Mutation::AddPlayer { name: "Alice".into() },
            Mutation::AddPlayer { name: "Bob".into() },
            Mutation::AddPlayer { name: "Carol".into() },
            Mutation::AddRebuy { id: 2 },
            Mutation::AddAddon { id: 3 },
            Mutation::AddBountyChips { id: 3, amount: 500 },
            Mutation::EliminatePlayer { id: 1 },
        ];
        let start = TournamentDocument::from_template(&TournamentTemplate::default(), 0);
        script.iter().fold(start, |doc, mutation| {
            doc.apply(mutation, now_millis()).unwrap()
        })
    }

    #[test]
    fn tournament_figures() {
        let stats = TournamentStats::of(&populated());

        assert_eq!(stats.entries, 3);
        assert_eq!(stats.total_rebuys, 1);
        assert_eq!(stats.total_addons, 1);
        assert_eq!(stats.prize_pool, 3 * 1_000 + 1_000 + 1_500);
        assert_eq!(stats.active_players, 2);
        assert_eq!(stats.chips_in_play, 10_000 + 20_000 + 25_000);
        assert_eq!(stats.average_stack, (10_000 + 20_000 + 25_000) / 2);
        assert_eq!(stats.current_entry.map(|entry| entry.id), Some(1));
        assert_eq!(stats.upcoming_entry.map(|entry| entry.id), Some(2));
    }

    #[test]
    fn ranking_orders_by_stack_and_keeps_ties_stable() {
        let rows = ranking(&populated());
        let order: Vec<_> = rows.iter().map(|row| row.player_id).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(rows[0].rank, 1);

        let doc = TournamentDocument::from_template(&TournamentTemplate::default(), 0)
            .apply(&Mutation::AddPlayer { name: "X".into() }, 1)
            .and_then(|doc| doc.apply(&Mutation::AddPlayer { name: "Y".into() }, 2))
            .unwrap();
        let order: Vec<_> = ranking(&doc).iter().map(|row| row.player_id).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn huge_economics_saturate_instead_of_overflowing() {
        let doc = populated()
            .apply(
                &Mutation::UpdateEconomics(crate::state::mutation::EconomicsPatch {
                    rebuy_chips: Some(u64::MAX / 2 + 1),
                    rebuy_fee: Some(u64::MAX),
                    ..Default::default()
                }),
                now_millis(),
            )
            .and_then(|doc| doc.apply(&Mutation::AddRebuy { id: 2 }, now_millis()))
            .unwrap();

        let bob = PlayerLedger::of(&doc.players[&2], &doc.economics);
        assert_eq!(bob.total_chips, u64::MAX);
        assert_eq!(bob.total_cost, u64::MAX);

        let stats = TournamentStats::of(&doc);
        assert_eq!(stats.chips_in_play, u64::MAX);
        assert_eq!(stats.prize_pool, u64::MAX);
        assert_eq!(stats.average_stack, u64::MAX / 2 + 1);
    }

    #[test]
    fn owed_never_goes_negative() {
        let mut player = Player::new(1, "Alice".into(), 10_000);
        player.paid_amount = 5_000;
        let ledger = PlayerLedger::of(&player, &Economics::default());
        assert_eq!(ledger.owed, 0);
    }
}
