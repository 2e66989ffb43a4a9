//! Error taxonomy surfaced to callers of the store: a `thiserror` enum
//! wrapping the underlying database error type, plus a handful of
//! store-specific variants for the preconditions the store enforces.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account store is already open")]
    AlreadyOpen,

    #[error("account store is not open")]
    NotOpen,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad parameters: {0}")]
    BadParameters(String),

    #[error("message does not satisfy requested fields")]
    IncompleteMessage,

    #[error("database corruption detected: {0}")]
    DatabaseCorruption(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    TaskJoin(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
