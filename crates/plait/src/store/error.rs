//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing session records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record column held JSON that no longer decodes.
    #[error("corrupt record for session {session_id}: {source}")]
    CorruptRecord {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a record for storage failed.
    #[error("encoding record for session {session_id}: {source}")]
    Encode {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },
}
