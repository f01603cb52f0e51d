//! Player roster management: listing, creating and editing the people a
//! group plays with, independent of whether they ever sign in.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use blitz_store::{
    Collection, Expand, Filter, PrincipalSource, ReadOptions, RecordStore, decode_row,
    decode_rows,
};
use blitz_types::{MembershipWithPlayer, Player};

use crate::error::{EngineError, EngineResult};
use crate::identity::{IdentityResolver, PlayerPatch};

pub struct PlayerRoster {
    store: Arc<dyn RecordStore>,
    principals: Arc<dyn PrincipalSource>,
    resolver: Arc<IdentityResolver>,
}

impl PlayerRoster {
    pub fn new(
        store: Arc<dyn RecordStore>,
        principals: Arc<dyn PrincipalSource>,
        resolver: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            store,
            principals,
            resolver,
        }
    }

    /// Players in a group, or the caller's visible roster: everything for
    /// privileged callers, otherwise only players the caller created or
    /// that carry their email. Empty without a principal.
    pub async fn fetch_players(&self, group_id: Option<Uuid>) -> EngineResult<Vec<Player>> {
        let Some(principal) = self.principals.current_principal().await else {
            return Ok(Vec::new());
        };

        // Make sure the caller's own profile exists before listing others.
        if self.resolver.player().await.is_none() {
            self.resolver.resolve(false).await;
        }

        if let Some(group_id) = group_id {
            let rows = self
                .store
                .read_many(
                    Collection::Memberships,
                    &Filter::Eq("group_id", json!(group_id)),
                    &ReadOptions::new().expand(Expand::new("players")),
                )
                .await?;
            let members: Vec<MembershipWithPlayer> = decode_rows(rows)?;
            return Ok(members.into_iter().filter_map(|m| m.players).collect());
        }

        let filter = if self.resolver.is_privileged().await {
            Filter::All
        } else {
            let mut clauses = vec![Filter::Eq("user_id", json!(principal.id))];
            if let Some(email) = &principal.email {
                clauses.push(Filter::Eq("email", json!(email)));
            }
            Filter::Or(clauses)
        };
        let rows = self
            .store
            .read_many(
                Collection::Players,
                &filter,
                &ReadOptions::new().order_asc("name"),
            )
            .await?;
        Ok(decode_rows(rows)?)
    }

    /// Add a player, reusing an existing record when the email already
    /// belongs to one. With a group id the player is attached to the
    /// group; an existing membership is harmless.
    pub async fn add_player(
        &self,
        name: &str,
        email: Option<&str>,
        group_id: Option<Uuid>,
    ) -> EngineResult<Player> {
        let principal = self
            .principals
            .current_principal()
            .await
            .ok_or(EngineError::Unauthenticated("add players"))?;

        let email = email.map(str::trim).filter(|email| !email.is_empty());

        let mut player: Option<Player> = None;
        if let Some(email) = email {
            let row = self
                .store
                .read_one(
                    Collection::Players,
                    &Filter::Eq("email", json!(email)),
                    &ReadOptions::new(),
                )
                .await?;
            player = row.map(decode_row).transpose()?;
        }

        let player = match player {
            Some(existing) => existing,
            None => {
                let mut rows = self
                    .store
                    .insert(
                        Collection::Players,
                        vec![json!({
                            "name": name,
                            "email": email,
                            "user_id": principal.id,
                        })],
                    )
                    .await?;
                decode_row(rows.pop().ok_or_else(|| {
                    blitz_store::StoreError::transport("insert returned no rows")
                })?)?
            }
        };

        if let Some(group_id) = group_id {
            let membership = json!({ "group_id": group_id, "player_id": player.id });
            match self
                .store
                .insert(Collection::Memberships, vec![membership])
                .await
            {
                Ok(_) => {}
                Err(err) if err.is_duplicate_key() => {} // already a member
                Err(err) => {
                    warn!("Error adding player {} to group {group_id}: {err}", player.id);
                }
            }
        }

        Ok(player)
    }

    /// Partial update; refuses an email already carried by another player.
    pub async fn update_player(&self, id: Uuid, mut patch: PlayerPatch) -> EngineResult<Player> {
        patch.email = patch
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        if let Some(email) = patch.email.as_deref() {
            let taken = self
                .store
                .read_one(
                    Collection::Players,
                    &Filter::And(vec![
                        Filter::Eq("email", json!(email)),
                        Filter::Ne("id", json!(id)),
                    ]),
                    &ReadOptions::new(),
                )
                .await?;
            if taken.is_some() {
                return Err(EngineError::Conflict(
                    "a player with this email address already exists".to_string(),
                ));
            }
        }

        let rows = self
            .store
            .update(
                Collection::Players,
                &Filter::Eq("id", json!(id)),
                blitz_store::to_row(&patch)?,
            )
            .await?;
        let row = rows.into_iter().next().ok_or(EngineError::NotFound("player"))?;
        Ok(decode_row(row)?)
    }

    pub async fn delete_player(&self, id: Uuid) -> EngineResult<()> {
        self.store
            .delete(Collection::Players, &Filter::Eq("id", json!(id)))
            .await?;
        Ok(())
    }
}
