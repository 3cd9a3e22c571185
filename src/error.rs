use crate::state::StateKey;

/// Errors surfaced by store operations.
///
/// Mutating operations never swallow an error to keep bookkeeping consistent;
/// everything here propagates to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store is locked and rejects mutating operations.
    #[error("store \"{0}\" is locked")]
    Locked(String),

    /// A snapshot index outside the recorded history was requested.
    #[error("snapshot index {index} out of range ({len} recorded)")]
    SnapshotOutOfRange { index: usize, len: usize },

    /// Persistence was requested but the store has no persistence
    /// configuration or no storage backend.
    #[error("persistence is not configured for store \"{0}\"")]
    PersistenceNotConfigured(String),

    /// Messaging was requested but the store was built without a messenger.
    #[error("no messenger is configured for store \"{0}\"")]
    MessengerNotConfigured(String),

    /// The storage backend failed to read or write an entry.
    #[error("storage backend error for key \"{key}\": {message}")]
    Storage { key: StateKey, message: String },

    /// State could not be serialized or deserialized.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
