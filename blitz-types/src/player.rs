use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// The authenticated actor behind a request, as reported by the auth
/// provider. Read-only from the engine's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Principal {
    pub id: Uuid,
    pub email: Option<String>,
    /// Role claim from the provider's app metadata ("admin" grants privilege).
    pub role: Option<String>,
}

impl Principal {
    pub fn is_admin_role(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Durable profile record for a person in the game domain.
///
/// `user_id` links the profile to a Principal and is null until someone
/// signs in as this player. The store enforces no uniqueness on `user_id`
/// or `email`; duplicates are reconciled during identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Player {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: String, // ISO 8601 string
}
