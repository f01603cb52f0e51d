use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::group::GroupWithMembers;
use crate::score::GameScore;

/// Lifecycle state of a session. The backing store keeps this as a plain
/// string and may hand back values outside the known set, so unknown
/// statuses round-trip through `Other` instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Setup,
    Active,
    Finished,
    Other(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Setup => "setup",
            SessionStatus::Active => "active",
            SessionStatus::Finished => "finished",
            SessionStatus::Other(s) => s,
        }
    }
}

impl From<String> for SessionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "setup" => SessionStatus::Setup,
            "active" => SessionStatus::Active,
            "finished" => SessionStatus::Finished,
            _ => SessionStatus::Other(value),
        }
    }
}

impl From<SessionStatus> for String {
    fn from(value: SessionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One play-through of the game, belonging to exactly one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Session {
    pub id: Uuid,
    /// Owning principal.
    pub user_id: Uuid,
    pub group_id: Uuid,
    #[ts(type = "string")]
    pub status: SessionStatus,
    #[serde(default)]
    pub current_score: GameScore,
    pub created_at: String, // ISO 8601 string
}

/// Session with its group, memberships and players expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionWithGroup {
    #[serde(flatten)]
    pub session: Session,
    #[serde(default)]
    pub game_groups: Option<GroupWithMembers>,
}
