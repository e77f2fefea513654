//! Player ledger transitions.

use crate::state::{
    mutation::Rejection,
    tournament::{Player, PlayerId, TournamentDocument},
};

fn player_mut(doc: &mut TournamentDocument, id: PlayerId) -> Result<&mut Player, Rejection> {
    doc.players.get_mut(&id).ok_or(Rejection::UnknownPlayer(id))
}

fn clean_name(name: &str) -> Result<String, Rejection> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Rejection::EmptyName);
    }
    Ok(trimmed.to_string())
}

pub(crate) fn add_player(doc: &mut TournamentDocument, name: &str) -> Result<(), Rejection> {
    let name = clean_name(name)?;
    let id = doc.players.keys().copied().max().unwrap_or(0) + 1;
    doc.players
        .insert(id, Player::new(id, name, doc.economics.initial_chips));
    Ok(())
}

/// Ids and elimination orders of the remaining players are left as they are.
pub(crate) fn remove_player(doc: &mut TournamentDocument, id: PlayerId) -> Result<(), Rejection> {
    doc.players
        .shift_remove(&id)
        .map(|_| ())
        .ok_or(Rejection::UnknownPlayer(id))
}

pub(crate) fn rename_player(
    doc: &mut TournamentDocument,
    id: PlayerId,
    name: &str,
) -> Result<(), Rejection> {
    let name = clean_name(name)?;
    player_mut(doc, id)?.name = name;
    Ok(())
}

fn bump(counter: &mut u32) -> Result<(), Rejection> {
    *counter = counter.checked_add(1).ok_or(Rejection::OutOfRange)?;
    Ok(())
}

fn credit(total: &mut u64, amount: u64) -> Result<(), Rejection> {
    if amount == 0 {
        return Err(Rejection::InvalidAmount);
    }
    *total = total.checked_add(amount).ok_or(Rejection::OutOfRange)?;
    Ok(())
}

pub(crate) fn add_rebuy(doc: &mut TournamentDocument, id: PlayerId) -> Result<(), Rejection> {
    bump(&mut player_mut(doc, id)?.rebuys)
}

pub(crate) fn add_addon(doc: &mut TournamentDocument, id: PlayerId) -> Result<(), Rejection> {
    bump(&mut player_mut(doc, id)?.addons)
}

pub(crate) fn eliminate(doc: &mut TournamentDocument, id: PlayerId) -> Result<(), Rejection> {
    let order = doc.elimination_count + 1;
    let player = player_mut(doc, id)?;
    if player.is_eliminated {
        return Err(Rejection::AlreadyEliminated(id));
    }
    player.is_eliminated = true;
    player.elimination_order = Some(order);
    doc.elimination_count = order;
    Ok(())
}

/// Bring a player back; counts as a rebuy and closes the gap in the
/// elimination ranking.
pub(crate) fn revive(doc: &mut TournamentDocument, id: PlayerId) -> Result<(), Rejection> {
    let player = player_mut(doc, id)?;
    if !player.is_eliminated {
        return Err(Rejection::NotEliminated(id));
    }
    bump(&mut player.rebuys)?;
    let former = player.elimination_order.take();
    player.is_eliminated = false;

    if let Some(former) = former {
        for other in doc.players.values_mut() {
            match other.elimination_order.as_mut() {
                Some(order) if *order > former => *order -= 1,
                _ => {}
            }
        }
    }
    doc.elimination_count = doc.elimination_count.saturating_sub(1);
    Ok(())
}

pub(crate) fn add_bounty_chips(
    doc: &mut TournamentDocument,
    id: PlayerId,
    amount: u64,
) -> Result<(), Rejection> {
    credit(&mut player_mut(doc, id)?.bounty_chips, amount)
}

/// Payments accumulate without any cap; overpayment policy lives with the caller.
pub(crate) fn record_payment(
    doc: &mut TournamentDocument,
    id: PlayerId,
    amount: u64,
) -> Result<(), Rejection> {
    credit(&mut player_mut(doc, id)?.paid_amount, amount)
}

pub(crate) fn reset_eliminations(doc: &mut TournamentDocument) {
    for player in doc.players.values_mut() {
        player.is_eliminated = false;
        player.elimination_order = None;
    }
    doc.elimination_count = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        mutation::Mutation,
        stats::PlayerLedger,
        tournament::{Economics, TournamentTemplate},
    };

    fn document_with(names: &[&str]) -> TournamentDocument {
        let mut doc = TournamentDocument::from_template(&TournamentTemplate::default(), 0);
        for name in names {
            add_player(&mut doc, name).unwrap();
        }
        doc
    }

    fn assert_dense(doc: &TournamentDocument) {
        let mut orders: Vec<u32> = doc
            .players
            .values()
            .filter(|player| player.is_eliminated)
            .filter_map(|player| player.elimination_order)
            .collect();
        orders.sort_unstable();
        let expected: Vec<u32> = (1..=doc.elimination_count).collect();
        assert_eq!(orders, expected);
        assert!(
            doc.players
                .values()
                .filter(|player| !player.is_eliminated)
                .all(|player| player.elimination_order.is_none())
        );
    }

    #[test]
    fn add_player_assigns_next_id_and_default_stack() {
        let mut doc = document_with(&["Alice", "Bob"]);
        remove_player(&mut doc, 1).unwrap();
        add_player(&mut doc, "  Carol ").unwrap();

        let ids: Vec<_> = doc.players.keys().copied().collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(doc.players[&3].name, "Carol");
        assert_eq!(doc.players[&3].initial_chips, doc.economics.initial_chips);
        assert_eq!(add_player(&mut doc, "   "), Err(Rejection::EmptyName));
    }

    #[test]
    fn elimination_orders_stay_dense() {
        let mut doc = document_with(&["A", "B", "C", "D", "E"]);
        let script: [(bool, PlayerId); 10] = [
            (true, 1),
            (true, 3),
            (true, 5),
            (false, 3),
            (true, 2),
            (false, 1),
            (true, 3),
            (true, 4),
            (false, 2),
            (false, 4),
        ];

        for (eliminate_it, id) in script {
            if eliminate_it {
                eliminate(&mut doc, id).unwrap();
            } else {
                revive(&mut doc, id).unwrap();
            }
            assert_dense(&doc);
        }
        assert_eq!(doc.elimination_count, 2);
    }

    #[test]
    fn revive_inverts_eliminate_except_rebuys() {
        let doc = document_with(&["A", "B"]);
        let eliminated = doc.apply(&Mutation::EliminatePlayer { id: 2 }, 1).unwrap();
        let revived = eliminated
            .apply(&Mutation::RevivePlayer { id: 2 }, 2)
            .unwrap();

        let mut expected = doc.players[&2].clone();
        expected.rebuys += 1;
        assert_eq!(revived.players[&2], expected);
        assert_eq!(revived.elimination_count, doc.elimination_count);
    }

    #[test]
    fn double_eliminate_and_unknown_ids_are_rejected() {
        let mut doc = document_with(&["A"]);
        eliminate(&mut doc, 1).unwrap();
        assert_eq!(eliminate(&mut doc, 1), Err(Rejection::AlreadyEliminated(1)));
        assert_eq!(eliminate(&mut doc, 7), Err(Rejection::UnknownPlayer(7)));
        assert_eq!(add_rebuy(&mut doc, 7), Err(Rejection::UnknownPlayer(7)));
        assert_eq!(revive(&mut doc, 7), Err(Rejection::UnknownPlayer(7)));
        revive(&mut doc, 1).unwrap();
        assert_eq!(revive(&mut doc, 1), Err(Rejection::NotEliminated(1)));
    }

    #[test]
    fn alice_rebuy_scenario() {
        let mut doc = TournamentDocument::from_template(&TournamentTemplate::default(), 0);
        doc.economics = Economics {
            initial_chips: 10_000,
            rebuy_chips: 10_000,
            addon_chips: 15_000,
            entry_fee: 1_000,
            rebuy_fee: 1_000,
            addon_fee: 1_500,
        };
        add_player(&mut doc, "Alice").unwrap();
        add_rebuy(&mut doc, 1).unwrap();
        add_rebuy(&mut doc, 1).unwrap();
        add_addon(&mut doc, 1).unwrap();

        let ledger = PlayerLedger::of(&doc.players[&1], &doc.economics);
        assert_eq!(ledger.total_chips, 45_000);
        assert_eq!(ledger.total_cost, 4_500);
        assert_eq!(ledger.owed, 4_500);

        record_payment(&mut doc, 1, 3_000).unwrap();
        let ledger = PlayerLedger::of(&doc.players[&1], &doc.economics);
        assert_eq!(ledger.owed, 1_500);
        assert_eq!(record_payment(&mut doc, 1, 0), Err(Rejection::InvalidAmount));
    }

    #[test]
    fn bounty_chips_accumulate() {
        let mut doc = document_with(&["A"]);
        add_bounty_chips(&mut doc, 1, 500).unwrap();
        add_bounty_chips(&mut doc, 1, 250).unwrap();
        assert_eq!(doc.players[&1].bounty_chips, 750);
    }

    #[test]
    fn amounts_that_would_overflow_are_rejected() {
        let mut doc = document_with(&["A"]);
        add_bounty_chips(&mut doc, 1, u64::MAX).unwrap();
        assert_eq!(add_bounty_chips(&mut doc, 1, 1), Err(Rejection::OutOfRange));
        assert_eq!(doc.players[&1].bounty_chips, u64::MAX);

        record_payment(&mut doc, 1, u64::MAX).unwrap();
        assert_eq!(record_payment(&mut doc, 1, 1), Err(Rejection::OutOfRange));

        doc.players[&1].rebuys = u32::MAX;
        assert_eq!(add_rebuy(&mut doc, 1), Err(Rejection::OutOfRange));
        eliminate(&mut doc, 1).unwrap();
        assert_eq!(revive(&mut doc, 1), Err(Rejection::OutOfRange));
        assert!(doc.players[&1].is_eliminated);
    }

    #[test]
    fn reset_eliminations_clears_everyone() {
        let mut doc = document_with(&["A", "B", "C"]);
        eliminate(&mut doc, 2).unwrap();
        eliminate(&mut doc, 3).unwrap();

        reset_eliminations(&mut doc);

        assert_eq!(doc.elimination_count, 0);
        assert!(doc.players.values().all(|player| !player.is_eliminated));
        assert_dense(&doc);
    }
}
