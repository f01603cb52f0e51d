//! Group and session lifecycle and score tracking.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use blitz_store::{
    Collection, Expand, Filter, PrincipalSource, ReadOptions, RecordStore, decode_row,
    decode_rows,
};
use blitz_types::{
    GameScore, GameWord, Group, GroupWithMembers, Membership, Player, Principal, ScoreAssignment,
    Session, SessionStatus, SessionWithGroup,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::sampler::WordSampler;

/// Outcome of the implicit membership reconciliation that runs before a
/// session is created. Bookkeeping failures are reported here instead of
/// propagated: the session proceeds even when some inserts fail.
#[derive(Debug, Clone, Default)]
pub struct MembershipReport {
    pub added: Vec<Uuid>,
    pub already_members: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

impl MembershipReport {
    pub fn fully_applied(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A freshly created session together with the membership bookkeeping
/// that ran for it.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: SessionWithGroup,
    pub memberships: MembershipReport,
}

pub struct SessionEngine {
    store: Arc<dyn RecordStore>,
    principals: Arc<dyn PrincipalSource>,
    sampler: WordSampler,
    config: EngineConfig,
}

/// Session rows expanded down to the players in their group.
fn session_graph() -> Expand {
    Expand::new("game_groups").with(Expand::new("group_members").with(Expand::new("players")))
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        principals: Arc<dyn PrincipalSource>,
        config: EngineConfig,
    ) -> Self {
        let sampler =
            WordSampler::new(store.clone()).with_max_parallel(config.max_parallel_word_fetches);
        Self {
            store,
            principals,
            sampler,
            config,
        }
    }

    async fn require_principal(&self, action: &'static str) -> EngineResult<Principal> {
        self.principals
            .current_principal()
            .await
            .ok_or(EngineError::Unauthenticated(action))
    }

    /// The player row linked to a principal, if one exists.
    async fn linked_player(&self, principal_id: Uuid) -> EngineResult<Option<Player>> {
        let row = self
            .store
            .read_one(
                Collection::Players,
                &Filter::Eq("user_id", json!(principal_id)),
                &ReadOptions::new(),
            )
            .await?;
        Ok(row.map(decode_row).transpose()?)
    }

    /// Create a group owned by the caller. The caller's own player record
    /// joins the membership list when it exists and was not already picked.
    pub async fn create_group(&self, name: &str, player_ids: &[Uuid]) -> EngineResult<Group> {
        let principal = self.require_principal("create a group").await?;

        let mut rows = self
            .store
            .insert(
                Collection::Groups,
                vec![json!({ "name": name, "user_id": principal.id })],
            )
            .await?;
        let group: Group = decode_row(
            rows.pop()
                .ok_or_else(|| blitz_store::StoreError::transport("insert returned no rows"))?,
        )?;

        let mut member_ids: Vec<Uuid> = player_ids.to_vec();
        if let Some(creator) = self.linked_player(principal.id).await? {
            if !member_ids.contains(&creator.id) {
                member_ids.push(creator.id);
            }
        }
        if !member_ids.is_empty() {
            let members = member_ids
                .iter()
                .map(|player_id| json!({ "group_id": group.id, "player_id": player_id }))
                .collect();
            self.store.insert(Collection::Memberships, members).await?;
        }

        info!("Created group {} with {} members", group.id, member_ids.len());
        Ok(group)
    }

    /// Groups the caller owns or is a member of, newest first, with
    /// memberships, players and sessions nested in.
    pub async fn fetch_groups(&self) -> EngineResult<Vec<GroupWithMembers>> {
        let Some(principal) = self.principals.current_principal().await else {
            return Ok(Vec::new());
        };

        let mut clauses = vec![Filter::Eq("user_id", json!(principal.id))];
        if let Some(player) = self.linked_player(principal.id).await? {
            let memberships: Vec<Membership> = decode_rows(
                self.store
                    .read_many(
                        Collection::Memberships,
                        &Filter::Eq("player_id", json!(player.id)),
                        &ReadOptions::new(),
                    )
                    .await?,
            )?;
            if !memberships.is_empty() {
                let group_ids = memberships.iter().map(|m| json!(m.group_id)).collect();
                clauses.push(Filter::In("id", group_ids));
            }
        }

        let rows = self
            .store
            .read_many(
                Collection::Groups,
                &Filter::Or(clauses),
                &ReadOptions::new()
                    .expand(Expand::new("group_members").with(Expand::new("players")))
                    .expand(Expand::new("game_sessions"))
                    .order_desc("created_at"),
            )
            .await?;
        Ok(decode_rows(rows)?)
    }

    /// Create a session in `setup` with both teams at zero.
    ///
    /// Every assigned player is made a group member first; bookkeeping
    /// failures are carried in the returned report, never fatal.
    pub async fn create_session(
        &self,
        assignments: Vec<ScoreAssignment>,
        group_id: Uuid,
    ) -> EngineResult<CreatedSession> {
        let principal = self.require_principal("create a game session").await?;
        if assignments.len() < self.config.min_session_players {
            return Err(EngineError::InvalidArgument(format!(
                "select at least {} players",
                self.config.min_session_players
            )));
        }

        let memberships = self.ensure_members(group_id, &assignments).await;

        let mut rows = self
            .store
            .insert(
                Collection::Sessions,
                vec![json!({
                    "user_id": principal.id,
                    "status": SessionStatus::Setup,
                    "group_id": group_id,
                    "current_score": GameScore::initial(assignments),
                })],
            )
            .await?;
        let stored: Session = decode_row(
            rows.pop()
                .ok_or_else(|| blitz_store::StoreError::transport("insert returned no rows"))?,
        )?;

        let session = self.fetch_session_details(stored.id).await?;
        info!("Created session {} in group {group_id}", stored.id);
        Ok(CreatedSession {
            session,
            memberships,
        })
    }

    /// Insert the memberships missing for the given assignments. Lookup
    /// and insert failures are logged and reported; a duplicate-key
    /// rejection means someone joined concurrently and is harmless.
    async fn ensure_members(
        &self,
        group_id: Uuid,
        assignments: &[ScoreAssignment],
    ) -> MembershipReport {
        let mut report = MembershipReport::default();
        let player_ids: Vec<Uuid> = {
            let mut seen = HashSet::new();
            assignments
                .iter()
                .map(|a| a.player_id)
                .filter(|id| seen.insert(*id))
                .collect()
        };

        let existing_filter = Filter::And(vec![
            Filter::Eq("group_id", json!(group_id)),
            Filter::In(
                "player_id",
                player_ids.iter().map(|id| json!(id)).collect(),
            ),
        ]);
        let existing: Vec<Membership> = match self
            .store
            .read_many(Collection::Memberships, &existing_filter, &ReadOptions::new())
            .await
            .and_then(decode_rows)
        {
            Ok(existing) => existing,
            Err(err) => {
                warn!("Could not check members of group {group_id}: {err}");
                Vec::new()
            }
        };
        let existing_ids: HashSet<Uuid> = existing.iter().map(|m| m.player_id).collect();

        let mut missing = Vec::new();
        for player_id in player_ids {
            if existing_ids.contains(&player_id) {
                report.already_members.push(player_id);
            } else {
                missing.push(player_id);
            }
        }
        if missing.is_empty() {
            return report;
        }

        let rows = missing
            .iter()
            .map(|player_id| json!({ "group_id": group_id, "player_id": player_id }))
            .collect();
        match self.store.insert(Collection::Memberships, rows).await {
            Ok(_) => report.added = missing,
            Err(err) if err.is_duplicate_key() => {
                warn!("Members raced into group {group_id}: {err}");
                report.already_members.extend(missing);
            }
            Err(err) => {
                warn!("Error adding members to group {group_id}: {err}");
                report.failed = missing;
            }
        }
        report
    }

    /// Recent sessions, newest first. With a group id, that group's
    /// sessions regardless of the caller; otherwise sessions the caller
    /// owns or participates in through a group.
    pub async fn fetch_recent_sessions(
        &self,
        limit: usize,
        group_id: Option<Uuid>,
    ) -> EngineResult<Vec<SessionWithGroup>> {
        let Some(principal) = self.principals.current_principal().await else {
            return Ok(Vec::new());
        };
        let options = ReadOptions::new()
            .expand(session_graph())
            .order_desc("created_at")
            .limit(limit);

        if let Some(group_id) = group_id {
            let rows = self
                .store
                .read_many(
                    Collection::Sessions,
                    &Filter::Eq("group_id", json!(group_id)),
                    &options,
                )
                .await?;
            return Ok(decode_rows(rows)?);
        }
        let mut clauses = vec![Filter::Eq("user_id", json!(principal.id))];
        if let Some(player) = self.linked_player(principal.id).await? {
            let memberships: Vec<Membership> = decode_rows(
                self.store
                    .read_many(
                        Collection::Memberships,
                        &Filter::Eq("player_id", json!(player.id)),
                        &ReadOptions::new(),
                    )
                    .await?,
            )?;
            if !memberships.is_empty() {
                let group_ids = memberships.iter().map(|m| json!(m.group_id)).collect();
                clauses.push(Filter::In("group_id", group_ids));
            }
        }

        let rows = self
            .store
            .read_many(Collection::Sessions, &Filter::Or(clauses), &options)
            .await?;
        Ok(decode_rows(rows)?)
    }

    /// A single session with its full group/membership/player graph.
    pub async fn fetch_session_details(&self, id: Uuid) -> EngineResult<SessionWithGroup> {
        let row = self
            .store
            .read_one(
                Collection::Sessions,
                &Filter::Eq("id", json!(id)),
                &ReadOptions::new().expand(session_graph()),
            )
            .await?
            .ok_or(EngineError::NotFound("game session"))?;
        Ok(decode_row(row)?)
    }

    /// Write the running score and optionally the status.
    ///
    /// Concurrent writers are last-write-wins; the store keeps no version
    /// column, so two devices updating the same session race by design.
    /// Forward-only status ordering is enforced only when configured.
    pub async fn update_session_score(
        &self,
        id: Uuid,
        score: GameScore,
        status: Option<SessionStatus>,
    ) -> EngineResult<Session> {
        if let Some(next) = &status {
            if self.config.enforce_status_transitions {
                let row = self
                    .store
                    .read_one(
                        Collection::Sessions,
                        &Filter::Eq("id", json!(id)),
                        &ReadOptions::new(),
                    )
                    .await?
                    .ok_or(EngineError::NotFound("game session"))?;
                let current: Session = decode_row(row)?;
                validate_transition(&current.status, next)?;
            }
        }

        let mut patch = json!({ "current_score": score });
        if let Some(status) = status {
            patch["status"] = json!(status);
        }
        let rows = self
            .store
            .update(Collection::Sessions, &Filter::Eq("id", json!(id)), patch)
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(EngineError::NotFound("game session"))?;
        Ok(decode_row(row)?)
    }

    pub async fn delete_session(&self, id: Uuid) -> EngineResult<()> {
        let filter = Filter::Eq("id", json!(id));
        let existing = self
            .store
            .read_one(Collection::Sessions, &filter, &ReadOptions::new())
            .await?;
        if existing.is_none() {
            return Err(EngineError::NotFound("game session"));
        }
        self.store.delete(Collection::Sessions, &filter).await?;
        Ok(())
    }

    /// Draw words for a turn; see [`WordSampler::sample`].
    pub async fn draw_words(&self, language: &str, count: usize) -> Vec<GameWord> {
        let language = if language.is_empty() {
            self.config.default_language.as_str()
        } else {
            language
        };
        self.sampler.sample(language, count).await
    }
}

/// Sessions only move forward: setup, then active, then finished.
/// Re-writing the current status stays allowed so score updates can keep
/// sending it.
fn validate_transition(current: &SessionStatus, next: &SessionStatus) -> EngineResult<()> {
    fn stage(status: &SessionStatus) -> Option<u8> {
        match status {
            SessionStatus::Setup => Some(0),
            SessionStatus::Active => Some(1),
            SessionStatus::Finished => Some(2),
            SessionStatus::Other(_) => None,
        }
    }
    match (stage(current), stage(next)) {
        (Some(from), Some(to)) if to >= from => Ok(()),
        _ => Err(EngineError::Conflict(format!(
            "cannot move session from {current} to {next}"
        ))),
    }
}
