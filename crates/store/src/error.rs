//! Store-level error type.
//!
//! Kept separate from the domain taxonomy so a storage backend can be
//! swapped without touching engine error handling; the engine converts
//! at its boundary ([`HeadConflict`](StoreError::HeadConflict) feeds
//! the append retry loop, everything else becomes an internal error).

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// The compare-and-set on a partition head observed a different
    /// head than expected. The caller must re-read and retry.
    #[error("Audit head moved for partition '{partition}'")]
    HeadConflict { partition: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
