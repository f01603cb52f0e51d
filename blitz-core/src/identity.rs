//! Resolution of the authenticated principal to a durable player profile.
//!
//! The store enforces no uniqueness on `user_id` or `email`, so a person
//! can end up with several player rows (invited by name first, signed up
//! later, signed in through a second provider). Resolution picks the
//! strongest candidate, repairs its identity links, and creates a profile
//! lazily when none exists. Failures never abort the calling flow: the
//! cached profile just stays empty.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, warn};

use blitz_store::{
    Collection, Filter, PrincipalSource, ReadOptions, RecordStore, decode_row, decode_rows,
};
use blitz_types::{Player, Principal};

use crate::error::{EngineError, EngineResult};

/// Cached resolution state, owned by the caller's session scope rather
/// than a process-wide global.
#[derive(Debug, Clone, Default)]
pub struct ProfileState {
    pub player: Option<Player>,
    pub loading: bool,
    pub initialized: bool,
}

/// Partial profile update; only supplied fields are written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

type InflightResolve = Shared<BoxFuture<'static, ()>>;

pub struct IdentityResolver {
    store: Arc<dyn RecordStore>,
    principals: Arc<dyn PrincipalSource>,
    state: Arc<RwLock<ProfileState>>,
    /// Single-flight handle: at most one resolution is outstanding at a
    /// time; concurrent callers await the same shared future. The
    /// generation tag lets a forced resolve replace the handle without
    /// the superseded task clearing its successor on completion.
    inflight: Mutex<Option<(u64, InflightResolve)>>,
    generation: AtomicU64,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn RecordStore>, principals: Arc<dyn PrincipalSource>) -> Self {
        Self {
            store,
            principals,
            state: Arc::new(RwLock::new(ProfileState::default())),
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the cached resolution state.
    pub async fn profile(&self) -> ProfileState {
        self.state.read().await.clone()
    }

    /// The resolved player, if resolution has produced one.
    pub async fn player(&self) -> Option<Player> {
        self.state.read().await.player.clone()
    }

    /// Resolve the current principal into a cached player profile.
    ///
    /// With `force` false, a resolution already in flight is awaited and
    /// reused, and a cached profile matching the current principal is
    /// kept without a store round trip. Store failures are reported and
    /// degrade to an empty profile; they never propagate.
    pub async fn resolve(&self, force: bool) {
        let (generation, resolution) = {
            let mut inflight = self.inflight.lock().await;
            // A settled handle can linger when the caller that created it
            // was cancelled before clearing; retire it so we resolve fresh.
            let settled =
                matches!(inflight.as_ref(), Some((_, pending)) if pending.peek().is_some());
            if settled {
                *inflight = None;
            }
            if !force {
                if let Some((_, pending)) = inflight.as_ref() {
                    let pending = pending.clone();
                    drop(inflight);
                    pending.await;
                    return;
                }
            }
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            let task = resolve_task(
                self.store.clone(),
                self.principals.clone(),
                self.state.clone(),
                force,
            )
            .boxed()
            .shared();
            *inflight = Some((generation, task.clone()));
            (generation, task)
        };

        resolution.await;

        // Clear the handle so future calls can retry, unless a forced
        // resolve already replaced it with a newer one.
        let mut inflight = self.inflight.lock().await;
        if matches!(inflight.as_ref(), Some((current, _)) if *current == generation) {
            *inflight = None;
        }
    }

    /// Write the supplied fields to the caller's profile and refresh the
    /// cache with the stored row.
    pub async fn update(&self, patch: PlayerPatch) -> EngineResult<Player> {
        let principal = self
            .principals
            .current_principal()
            .await
            .ok_or(EngineError::Unauthenticated("update your profile"))?;

        let patch = blitz_store::to_row(&patch)?;
        let rows = self
            .store
            .update(
                Collection::Players,
                &Filter::Eq("user_id", json!(principal.id)),
                patch,
            )
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(EngineError::NotFound("player profile"))?;
        let player: Player = decode_row(row)?;
        self.state.write().await.player = Some(player.clone());
        Ok(player)
    }

    /// Whether the caller may administer the game. The provider's role
    /// claim and the profile's admin flag each suffice on their own, so
    /// this works before resolution has finished.
    pub async fn is_privileged(&self) -> bool {
        if self
            .principals
            .current_principal()
            .await
            .is_some_and(|principal| principal.is_admin_role())
        {
            return true;
        }
        self.state
            .read()
            .await
            .player
            .as_ref()
            .is_some_and(|player| player.is_admin)
    }
}

async fn resolve_task(
    store: Arc<dyn RecordStore>,
    principals: Arc<dyn PrincipalSource>,
    state: Arc<RwLock<ProfileState>>,
    force: bool,
) {
    state.write().await.loading = true;

    run_resolution(&store, &principals, &state, force).await;

    let mut state = state.write().await;
    state.loading = false;
    state.initialized = true;
}

async fn run_resolution(
    store: &Arc<dyn RecordStore>,
    principals: &Arc<dyn PrincipalSource>,
    state: &Arc<RwLock<ProfileState>>,
    force: bool,
) {
    let Some(principal) = principals.current_principal().await else {
        state.write().await.player = None;
        return;
    };

    if !force {
        let cached = state.read().await.player.clone();
        if cached.is_some_and(|player| player.user_id == Some(principal.id)) {
            debug!("Profile for {} already resolved", principal.id);
            return;
        }
    }

    match lookup_and_reconcile(store, &principal).await {
        Ok(player) => state.write().await.player = Some(player),
        Err(err) => {
            error!("Profile resolution for {} failed: {err}", principal.id);
            state.write().await.player = None;
        }
    }
}

/// One consolidated lookup: any player row matching the principal's
/// account id or email. Zero, one, or several candidates can come back.
async fn lookup_and_reconcile(
    store: &Arc<dyn RecordStore>,
    principal: &Principal,
) -> EngineResult<Player> {
    let mut clauses = vec![Filter::Eq("user_id", json!(principal.id))];
    if let Some(email) = &principal.email {
        clauses.push(Filter::Eq("email", json!(email)));
    }
    let rows = store
        .read_many(Collection::Players, &Filter::Or(clauses), &ReadOptions::new())
        .await?;
    let candidates: Vec<Player> = decode_rows(rows)?;

    match select_candidate(candidates, principal) {
        Some(player) => reconcile(store, player, principal).await,
        None => create_profile(store, principal).await,
    }
}

/// Pick the canonical candidate: both keys matching beats account id
/// beats email beats whatever the store returned first.
fn select_candidate(mut candidates: Vec<Player>, principal: &Principal) -> Option<Player> {
    if candidates.is_empty() {
        return None;
    }
    let email_matches =
        |player: &Player| principal.email.is_some() && player.email == principal.email;
    let index = candidates
        .iter()
        .position(|p| p.user_id == Some(principal.id) && email_matches(p))
        .or_else(|| {
            candidates
                .iter()
                .position(|p| p.user_id == Some(principal.id))
        })
        .or_else(|| candidates.iter().position(email_matches))
        .unwrap_or(0);
    Some(candidates.swap_remove(index))
}

/// Repair the selected row when its identity links are stale. The email
/// is only overwritten when the principal has one; it is never cleared
/// based on absence.
async fn reconcile(
    store: &Arc<dyn RecordStore>,
    player: Player,
    principal: &Principal,
) -> EngineResult<Player> {
    let email_stale = principal.email.is_some() && player.email != principal.email;
    if player.user_id == Some(principal.id) && !email_stale {
        return Ok(player);
    }

    let mut patch = json!({ "user_id": principal.id });
    if let Some(email) = &principal.email {
        patch["email"] = json!(email);
    }
    let rows = store
        .update(
            Collection::Players,
            &Filter::Eq("id", json!(player.id)),
            patch,
        )
        .await?;
    match rows.into_iter().next() {
        Some(row) => Ok(decode_row(row)?),
        None => {
            // Row vanished between lookup and write; keep the candidate.
            warn!("Profile correction for {} matched no rows", player.id);
            Ok(player)
        }
    }
}

async fn create_profile(
    store: &Arc<dyn RecordStore>,
    principal: &Principal,
) -> EngineResult<Player> {
    let name = principal
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or("Player")
        .to_string();
    let row = json!({
        "user_id": principal.id,
        "name": name,
        "email": principal.email,
        "is_admin": false,
    });
    let mut rows = store.insert(Collection::Players, vec![row]).await?;
    if rows.is_empty() {
        return Err(blitz_store::StoreError::transport("insert returned no rows").into());
    }
    Ok(decode_row(rows.remove(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn player(user_id: Option<Uuid>, email: Option<&str>) -> Player {
        Player {
            id: Uuid::new_v4(),
            user_id,
            name: "someone".to_string(),
            email: email.map(str::to_string),
            is_admin: false,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn candidate_priority_prefers_account_id_over_email() {
        let me = Uuid::new_v4();
        let principal = Principal {
            id: me,
            email: Some("me@example.com".to_string()),
            role: None,
        };
        let by_id = player(Some(me), Some("old@example.com"));
        let by_email = player(Some(Uuid::new_v4()), Some("me@example.com"));

        let selected =
            select_candidate(vec![by_email.clone(), by_id.clone()], &principal).unwrap();
        assert_eq!(selected.id, by_id.id);
    }

    #[test]
    fn candidate_priority_prefers_full_match() {
        let me = Uuid::new_v4();
        let principal = Principal {
            id: me,
            email: Some("me@example.com".to_string()),
            role: None,
        };
        let by_id = player(Some(me), None);
        let full = player(Some(me), Some("me@example.com"));

        let selected = select_candidate(vec![by_id, full.clone()], &principal).unwrap();
        assert_eq!(selected.id, full.id);
    }

    #[test]
    fn candidate_priority_falls_back_to_first_row() {
        let principal = Principal {
            id: Uuid::new_v4(),
            email: None,
            role: None,
        };
        let first = player(Some(Uuid::new_v4()), Some("a@example.com"));
        let second = player(Some(Uuid::new_v4()), Some("b@example.com"));

        let selected = select_candidate(vec![first.clone(), second], &principal).unwrap();
        assert_eq!(selected.id, first.id);
    }

    #[test]
    fn no_candidates_means_no_selection() {
        let principal = Principal {
            id: Uuid::new_v4(),
            email: None,
            role: None,
        };
        assert!(select_candidate(Vec::new(), &principal).is_none());
    }
}
