use thiserror::Error;

use blitz_store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by engine operations for UI-level handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No resolvable principal for an operation that requires one.
    #[error("you must be signed in to {0}")]
    Unauthenticated(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Any underlying transport or query failure.
    #[error("store failure")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, EngineError::Unauthenticated(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
