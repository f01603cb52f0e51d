//! In-memory reference backend.
//!
//! Plays the role of the remote record service in tests and local
//! development: store-assigned ids and timestamps, the `group_members`
//! unique constraint, relation expansion over the game schema, and a
//! settable current principal. Read/write counters let tests assert on
//! query traffic.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use uuid::Uuid;

use blitz_types::Principal;

use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::{
    Collection, Direction, Expand, PrincipalSource, ReadOptions, RecordStore, Row,
};

enum RelationKind {
    /// One-to-many: child rows hold a foreign key back to this row's id.
    Children { foreign_key: &'static str },
    /// Many-to-one: this row holds a foreign key to the target's id.
    Parent { foreign_key: &'static str },
}

struct Relation {
    target: Collection,
    kind: RelationKind,
}

fn relation(collection: Collection, name: &str) -> Option<Relation> {
    match (collection, name) {
        (Collection::Groups, "group_members") => Some(Relation {
            target: Collection::Memberships,
            kind: RelationKind::Children {
                foreign_key: "group_id",
            },
        }),
        (Collection::Groups, "game_sessions") => Some(Relation {
            target: Collection::Sessions,
            kind: RelationKind::Children {
                foreign_key: "group_id",
            },
        }),
        (Collection::Memberships, "players") => Some(Relation {
            target: Collection::Players,
            kind: RelationKind::Parent {
                foreign_key: "player_id",
            },
        }),
        (Collection::Sessions, "game_groups") => Some(Relation {
            target: Collection::Groups,
            kind: RelationKind::Parent {
                foreign_key: "group_id",
            },
        }),
        _ => None,
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(_), None) => CmpOrdering::Greater,
        (None, Some(_)) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<Collection, Vec<Row>>,
    principal: RwLock<Option<Principal>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or clear the authenticated principal for this store session.
    pub async fn set_principal(&self, principal: Option<Principal>) {
        *self.principal.write().await = principal;
    }

    /// Number of read operations (count / read_one / read_many) issued.
    pub fn read_ops(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of write operations (insert / update / delete) issued.
    pub fn write_ops(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Snapshot of a table. Rows are cloned out so no shard lock is held
    /// while expansion walks other tables.
    fn table(&self, collection: Collection) -> Vec<Row> {
        self.tables
            .get(&collection)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    fn expand_row(
        &self,
        collection: Collection,
        row: &mut Row,
        expands: &[Expand],
    ) -> StoreResult<()> {
        for expand in expands {
            let rel = relation(collection, expand.relation).ok_or_else(|| {
                StoreError::transport(format!(
                    "unknown relation {} on {collection}",
                    expand.relation
                ))
            })?;
            let value = match rel.kind {
                RelationKind::Children { foreign_key } => {
                    let id = row.get("id").cloned().unwrap_or(Value::Null);
                    let mut children: Vec<Row> = self
                        .table(rel.target)
                        .into_iter()
                        .filter(|child| child.get(foreign_key) == Some(&id))
                        .collect();
                    for child in &mut children {
                        self.expand_row(rel.target, child, &expand.nested)?;
                    }
                    Value::Array(children)
                }
                RelationKind::Parent { foreign_key } => {
                    let key = row.get(foreign_key).cloned().unwrap_or(Value::Null);
                    match self
                        .table(rel.target)
                        .into_iter()
                        .find(|parent| parent.get("id") == Some(&key))
                    {
                        Some(mut parent) => {
                            self.expand_row(rel.target, &mut parent, &expand.nested)?;
                            parent
                        }
                        None => Value::Null,
                    }
                }
            };
            if let Some(fields) = row.as_object_mut() {
                fields.insert(expand.relation.to_string(), value);
            }
        }
        Ok(())
    }

    fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Vec<Row>> {
        let mut rows: Vec<Row> = self
            .table(collection)
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect();
        if let Some(order) = &options.order_by {
            rows.sort_by(|a, b| {
                let ordering = compare_fields(a.get(order.field), b.get(order.field));
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(offset) = options.offset {
            rows = rows.into_iter().skip(offset).collect();
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        for row in &mut rows {
            self.expand_row(collection, row, &options.expand)?;
        }
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .table(collection)
            .iter()
            .filter(|row| filter.matches(row))
            .count() as u64)
    }

    async fn read_one(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Option<Row>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.query(collection, filter, options)?.into_iter().next())
    }

    async fn read_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Vec<Row>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.query(collection, filter, options)
    }

    async fn insert(&self, collection: Collection, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut prepared = Vec::with_capacity(rows.len());
        for mut row in rows {
            let fields = row
                .as_object_mut()
                .ok_or_else(|| StoreError::transport("insert expects object rows"))?;
            fields
                .entry("id")
                .or_insert_with(|| json!(Uuid::new_v4()));
            fields
                .entry("created_at")
                .or_insert_with(|| json!(chrono::Utc::now().to_rfc3339()));
            prepared.push(row);
        }

        let mut table = self.tables.entry(collection).or_default();
        if collection == Collection::Memberships {
            // (group_id, player_id) is unique; the whole batch is rejected
            // on a violation, like the real backend does.
            let mut pairs: Vec<(Value, Value)> = table
                .iter()
                .map(|row| {
                    (
                        row.get("group_id").cloned().unwrap_or(Value::Null),
                        row.get("player_id").cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();
            for row in &prepared {
                let pair = (
                    row.get("group_id").cloned().unwrap_or(Value::Null),
                    row.get("player_id").cloned().unwrap_or(Value::Null),
                );
                if pairs.contains(&pair) {
                    return Err(StoreError::DuplicateKey {
                        collection: Collection::Memberships.name(),
                        detail: format!("player {} already in group {}", pair.1, pair.0),
                    });
                }
                pairs.push(pair);
            }
        }
        table.extend(prepared.iter().cloned());
        Ok(prepared)
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Row,
    ) -> StoreResult<Vec<Row>> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let patch = patch
            .as_object()
            .ok_or_else(|| StoreError::transport("update expects an object patch"))?
            .clone();
        let mut updated = Vec::new();
        let mut table = self.tables.entry(collection).or_default();
        for row in table.iter_mut() {
            if filter.matches(row) {
                if let Some(fields) = row.as_object_mut() {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut table = self.tables.entry(collection).or_default();
        table.retain(|row| !filter.matches(row));
        Ok(())
    }
}

#[async_trait]
impl PrincipalSource for MemoryStore {
    async fn current_principal(&self) -> Option<Principal> {
        self.principal.read().await.clone()
    }
}
