//! Contract for the remote record store backing the game.
//!
//! The production backend is an external collaborator; this crate only
//! defines what the engine consumes: named collections, typed filters,
//! range-limited reads with relation expansion, and the error taxonomy.
//! The `memory-store` feature ships a reference backend for tests and
//! local development.

pub mod error;
pub mod filter;
#[cfg(feature = "memory-store")]
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use filter::Filter;
#[cfg(feature = "memory-store")]
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use blitz_types::Principal;

/// A row as it travels over the wire: semi-structured JSON.
pub type Row = Value;

/// The collections the game engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Players,
    Groups,
    Memberships,
    Sessions,
    Words,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Players => "players",
            Collection::Groups => "game_groups",
            Collection::Memberships => "group_members",
            Collection::Sessions => "game_sessions",
            Collection::Words => "words",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: Direction,
}

/// Nested relation expansion by relation name, e.g. a session's
/// `game_groups` with its `group_members` and their `players`.
#[derive(Debug, Clone)]
pub struct Expand {
    pub relation: &'static str,
    pub nested: Vec<Expand>,
}

impl Expand {
    pub fn new(relation: &'static str) -> Self {
        Self {
            relation,
            nested: Vec::new(),
        }
    }

    pub fn with(mut self, nested: Expand) -> Self {
        self.nested.push(nested);
        self
    }
}

/// Read shaping: ordering, range limits, and relation expansion.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub expand: Vec<Expand>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_asc(mut self, field: &'static str) -> Self {
        self.order_by = Some(OrderBy {
            field,
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_desc(mut self, field: &'static str) -> Self {
        self.order_by = Some(OrderBy {
            field,
            direction: Direction::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn expand(mut self, expand: Expand) -> Self {
        self.expand.push(expand);
        self
    }
}

/// Abstraction over the remote record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of rows matching the filter.
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;

    /// First matching row, or `None` when nothing matches.
    async fn read_one(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Option<Row>>;

    /// All matching rows, shaped by `options`.
    async fn read_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &ReadOptions,
    ) -> StoreResult<Vec<Row>>;

    /// Insert rows and return them as stored (ids and timestamps assigned).
    async fn insert(&self, collection: Collection, rows: Vec<Row>) -> StoreResult<Vec<Row>>;

    /// Merge `patch` into every matching row; returns the updated rows,
    /// which may be empty when nothing matched.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Row,
    ) -> StoreResult<Vec<Row>>;

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<()>;
}

/// Source of the authenticated principal attached to the store session.
#[async_trait]
pub trait PrincipalSource: Send + Sync {
    async fn current_principal(&self) -> Option<Principal>;
}

/// Decode a row into a typed value.
pub fn decode_row<T: DeserializeOwned>(row: Row) -> StoreResult<T> {
    Ok(serde_json::from_value(row)?)
}

/// Decode a batch of rows into typed values.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}

/// Encode a typed value into a row.
pub fn to_row<T: Serialize>(value: &T) -> StoreResult<Row> {
    Ok(serde_json::to_value(value)?)
}
