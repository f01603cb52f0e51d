use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// A row of the word corpus. Read-only from the engine's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Word {
    pub id: Uuid,
    pub text: String,
    pub language: String,
    /// Absent or false means the word is in play.
    #[serde(default)]
    pub is_disabled: Option<bool>,
}

impl Word {
    pub fn is_enabled(&self) -> bool {
        !self.is_disabled.unwrap_or(false)
    }
}

/// The slice of a word handed to a running game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameWord {
    pub id: Uuid,
    pub text: String,
}
