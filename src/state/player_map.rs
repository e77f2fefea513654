use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serializer};
use tracing::warn;

use crate::state::tournament::{Player, PlayerId};

/// Players are persisted as a plain array in registration order.
pub fn serialize<S>(value: &IndexMap<PlayerId, Player>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(value.values())
}

/// Rebuild the id index from an array, keeping the first player for each id.
pub fn deserialize<'de, D>(deserializer: D) -> Result<IndexMap<PlayerId, Player>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Player>::deserialize(deserializer)?;
    let mut players = IndexMap::with_capacity(raw.len());
    for player in raw {
        if player.id == 0 || players.contains_key(&player.id) {
            warn!(player_id = player.id, "dropping player with invalid or duplicate id");
            continue;
        }
        players.insert(player.id, player);
    }
    Ok(players)
}
