//! Error types for the diary data layer.

use thiserror::Error;

/// Errors surfaced by searches, logging and live diary queries.
///
/// Nothing in this crate retries: every failure reaches the caller as one of
/// these kinds.
#[derive(Debug, Error)]
pub enum DiaryError {
    /// Rejected before touching the store (bad date, servings or meal type).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store could not be reached or a read did not complete.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The write transaction did not commit. Nothing was persisted.
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

impl DiaryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DiaryError::InvalidInput(message.into())
    }

    /// Maps an error raised while reading.
    pub(crate) fn read(err: sqlx::Error) -> Self {
        DiaryError::StoreUnavailable(err.to_string())
    }

    /// Maps an error raised inside a write. Connection-level failures mean the
    /// store was never reached; anything else aborted the transaction.
    pub(crate) fn write(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Configuration(_) => DiaryError::StoreUnavailable(err.to_string()),
            other => DiaryError::WriteFailed(other.to_string()),
        }
    }
}
