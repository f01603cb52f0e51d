use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Serde helper for `scores`: a `BTreeMap<u32, i64>` serialized as a JSON
/// object with string keys (`{"1":0}`). The default derive cannot decode
/// this back when the containing struct is read through `#[serde(flatten)]`
/// (e.g. `SessionWithGroup`), because serde's flatten buffer hands integer
/// map keys to the deserializer as strings. This round-trips them
/// explicitly without changing the on-the-wire representation.
mod team_scores {
    use super::BTreeMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<u32, i64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        map.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<u32, i64>, D::Error> {
        let string_keyed = BTreeMap::<String, i64>::deserialize(deserializer)?;
        string_keyed
            .into_iter()
            .map(|(key, value)| {
                key.parse::<u32>()
                    .map(|key| (key, value))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// A player's seat in a session: which team they play for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScoreAssignment {
    pub player_id: Uuid,
    pub name: String,
    pub team: u32,
}

/// Running score embedded on a session as semi-structured JSON.
///
/// The store enforces no schema here; the engine is the sole guarantor of
/// shape, so every field is defaulted on decode and rows written by older
/// clients still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameScore {
    #[serde(default)]
    pub assignments: Vec<ScoreAssignment>,
    /// Team number to points.
    #[serde(default, with = "team_scores")]
    #[ts(as = "BTreeMap<u32, i64>")]
    pub scores: BTreeMap<u32, i64>,
    /// Per-player tallies, filled in as turns complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_stats: Option<BTreeMap<Uuid, i64>>,
}

impl GameScore {
    /// Initial score for a fresh session: the given seating and both teams
    /// at zero.
    pub fn initial(assignments: Vec<ScoreAssignment>) -> Self {
        Self {
            assignments,
            scores: BTreeMap::from([(1, 0), (2, 0)]),
            player_stats: None,
        }
    }
}
