use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::player::Player;
use crate::session::Session;

/// A named collection of players, owned by the principal who created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    /// Owning principal.
    pub user_id: Uuid,
    pub created_at: String, // ISO 8601 string
}

/// Join row between a group and a player, unique per (group, player).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Membership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub player_id: Uuid,
    pub created_at: String, // ISO 8601 string
}

/// Membership with its player expanded, as returned by nested reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MembershipWithPlayer {
    #[serde(flatten)]
    pub membership: Membership,
    #[serde(default)]
    pub players: Option<Player>,
}

/// Group with memberships (players expanded) and sessions nested in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupWithMembers {
    #[serde(flatten)]
    pub group: Group,
    #[serde(default)]
    pub group_members: Vec<MembershipWithPlayer>,
    #[serde(default)]
    pub game_sessions: Vec<Session>,
}

impl GroupWithMembers {
    /// Players expanded into this group's membership list.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.group_members.iter().filter_map(|m| m.players.as_ref())
    }
}
