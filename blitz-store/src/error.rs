use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by a record-store backend regardless of the product behind
/// it. "Not found" is not an error at this layer: `read_one` returns
/// `Ok(None)` and `update` returns an empty row set, so transport failures
/// stay distinguishable from missing rows.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Any transport or query failure reported by the backend.
    #[error("store transport failure: {message}")]
    Transport { message: String },
    /// A unique constraint rejected a write.
    #[error("duplicate key in {collection}: {detail}")]
    DuplicateKey {
        collection: &'static str,
        detail: String,
    },
    /// A row did not match the shape the caller asked to decode it into.
    #[error("row decode failed")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn transport(message: impl Into<String>) -> Self {
        StoreError::Transport {
            message: message.into(),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}
