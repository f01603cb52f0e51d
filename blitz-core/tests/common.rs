#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use blitz_core::{EngineConfig, IdentityResolver, SessionEngine};
use blitz_store::{
    Collection, Filter, MemoryStore, PrincipalSource, ReadOptions, RecordStore, Row, StoreError,
    StoreResult,
};
use blitz_types::{Player, Principal, ScoreAssignment};

/// Log output for tests that exercise degrade paths; repeated calls are
/// fine.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Fixed engine config so tests never depend on the environment.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        default_language: "en".to_string(),
        min_session_players: 2,
        max_parallel_word_fetches: 4,
        enforce_status_transitions: false,
    }
}

pub fn memory() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn engine(store: &Arc<MemoryStore>) -> SessionEngine {
    SessionEngine::new(store.clone(), store.clone(), test_config())
}

pub fn engine_with(store: &Arc<MemoryStore>, config: EngineConfig) -> SessionEngine {
    SessionEngine::new(store.clone(), store.clone(), config)
}

pub fn resolver(store: &Arc<MemoryStore>) -> IdentityResolver {
    IdentityResolver::new(store.clone(), store.clone())
}

pub fn principal(email: Option<&str>) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        email: email.map(str::to_string),
        role: None,
    }
}

/// Attach a fresh signed-in principal to the store and return it.
pub async fn sign_in(store: &Arc<MemoryStore>, email: &str) -> Principal {
    let signed_in = principal(Some(email));
    store.set_principal(Some(signed_in.clone())).await;
    signed_in
}

/// Same, but with the provider's admin role claim set.
pub async fn sign_in_admin(store: &Arc<MemoryStore>, email: &str) -> Principal {
    let signed_in = Principal {
        role: Some("admin".to_string()),
        ..principal(Some(email))
    };
    store.set_principal(Some(signed_in.clone())).await;
    signed_in
}

pub async fn seed_player(
    store: &Arc<MemoryStore>,
    name: &str,
    email: Option<&str>,
    user_id: Option<Uuid>,
) -> Player {
    let row = store
        .insert(
            Collection::Players,
            vec![json!({
                "name": name,
                "email": email,
                "user_id": user_id,
                "is_admin": false,
            })],
        )
        .await
        .unwrap()
        .remove(0);
    serde_json::from_value(row).unwrap()
}

pub async fn seed_admin_player(store: &Arc<MemoryStore>, name: &str, user_id: Uuid) -> Player {
    let row = store
        .insert(
            Collection::Players,
            vec![json!({ "name": name, "user_id": user_id, "is_admin": true })],
        )
        .await
        .unwrap()
        .remove(0);
    serde_json::from_value(row).unwrap()
}

pub async fn seed_group(store: &Arc<MemoryStore>, owner: Uuid, name: &str) -> Uuid {
    seed_group_at(store, owner, name, "2026-01-01T00:00:00+00:00").await
}

/// Seed a group with an explicit creation time, for ordering assertions.
pub async fn seed_group_at(
    store: &Arc<MemoryStore>,
    owner: Uuid,
    name: &str,
    created_at: &str,
) -> Uuid {
    let row = store
        .insert(
            Collection::Groups,
            vec![json!({ "name": name, "user_id": owner, "created_at": created_at })],
        )
        .await
        .unwrap()
        .remove(0);
    serde_json::from_value(row["id"].clone()).unwrap()
}

pub async fn seed_membership(store: &Arc<MemoryStore>, group_id: Uuid, player_id: Uuid) {
    store
        .insert(
            Collection::Memberships,
            vec![json!({ "group_id": group_id, "player_id": player_id })],
        )
        .await
        .unwrap();
}

pub async fn seed_session_at(
    store: &Arc<MemoryStore>,
    owner: Uuid,
    group_id: Uuid,
    created_at: &str,
) -> Uuid {
    let row = store
        .insert(
            Collection::Sessions,
            vec![json!({
                "user_id": owner,
                "group_id": group_id,
                "status": "setup",
                "current_score": {},
                "created_at": created_at,
            })],
        )
        .await
        .unwrap()
        .remove(0);
    serde_json::from_value(row["id"].clone()).unwrap()
}

pub async fn seed_words(store: &Arc<MemoryStore>, language: &str, count: usize) {
    let rows = (0..count)
        .map(|i| json!({ "text": format!("{language}-word-{i}"), "language": language }))
        .collect();
    store.insert(Collection::Words, rows).await.unwrap();
}

pub async fn seed_disabled_words(store: &Arc<MemoryStore>, language: &str, count: usize) {
    let rows = (0..count)
        .map(|i| {
            json!({
                "text": format!("{language}-disabled-{i}"),
                "language": language,
                "is_disabled": true,
            })
        })
        .collect();
    store.insert(Collection::Words, rows).await.unwrap();
}

pub fn assignment(player: &Player, team: u32) -> ScoreAssignment {
    ScoreAssignment {
        player_id: player.id,
        name: player.name.clone(),
        team,
    }
}

pub async fn memberships_of(store: &Arc<MemoryStore>, group_id: Uuid) -> Vec<Row> {
    store
        .read_many(
            Collection::Memberships,
            &Filter::Eq("group_id", json!(group_id)),
            &ReadOptions::new(),
        )
        .await
        .unwrap()
}

/// Fixed principal source for tests that pair it with a broken store.
pub struct StaticPrincipal(pub Option<Principal>);

#[async_trait]
impl PrincipalSource for StaticPrincipal {
    async fn current_principal(&self) -> Option<Principal> {
        self.0.clone()
    }
}

/// Store whose every operation fails at the transport layer.
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn count(&self, _: Collection, _: &Filter) -> StoreResult<u64> {
        Err(StoreError::transport("store offline"))
    }

    async fn read_one(
        &self,
        _: Collection,
        _: &Filter,
        _: &ReadOptions,
    ) -> StoreResult<Option<Row>> {
        Err(StoreError::transport("store offline"))
    }

    async fn read_many(
        &self,
        _: Collection,
        _: &Filter,
        _: &ReadOptions,
    ) -> StoreResult<Vec<Row>> {
        Err(StoreError::transport("store offline"))
    }

    async fn insert(&self, _: Collection, _: Vec<Row>) -> StoreResult<Vec<Row>> {
        Err(StoreError::transport("store offline"))
    }

    async fn update(&self, _: Collection, _: &Filter, _: Row) -> StoreResult<Vec<Row>> {
        Err(StoreError::transport("store offline"))
    }

    async fn delete(&self, _: Collection, _: &Filter) -> StoreResult<()> {
        Err(StoreError::transport("store offline"))
    }
}

/// Wrapper that yields to the scheduler before every operation so that
/// concurrent callers in a single-threaded test genuinely overlap.
pub struct YieldingStore(pub Arc<MemoryStore>);

#[async_trait]
impl RecordStore for YieldingStore {
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        tokio::task::yield_now().await;
        self.0.count(collection, filter).await
    }

    async fn read_one(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Option<Row>> {
        tokio::task::yield_now().await;
        self.0.read_one(collection, filter, options).await
    }

    async fn read_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Vec<Row>> {
        tokio::task::yield_now().await;
        self.0.read_many(collection, filter, options).await
    }

    async fn insert(&self, collection: Collection, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        tokio::task::yield_now().await;
        self.0.insert(collection, rows).await
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Row,
    ) -> StoreResult<Vec<Row>> {
        tokio::task::yield_now().await;
        self.0.update(collection, filter, patch).await
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<()> {
        tokio::task::yield_now().await;
        self.0.delete(collection, filter).await
    }
}

#[async_trait]
impl PrincipalSource for YieldingStore {
    async fn current_principal(&self) -> Option<Principal> {
        self.0.current_principal().await
    }
}
