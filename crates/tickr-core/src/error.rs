//! Error taxonomy for the scheduler/worker core.
//!
//! Mirrors the error kinds a caller needs to distinguish: some propagate
//! synchronously to a client, the rest are absorbed in a loop with logging.

use thiserror::Error;

/// The error kinds produced by the scheduler/worker core.
#[derive(Debug, Error)]
pub enum TickrError {
    /// Malformed job submission. Never reaches the scheduler.
    #[error("invalid job submission: {0}")]
    ClientError(String),

    /// Durable-store write failure. Surfaced synchronously to the submitter.
    #[error("durable store write failed: {0}")]
    StorePersistError(#[source] anyhow::Error),

    /// Fast-store read/write failure during scheduler operation. Never
    /// surfaced to clients; triggers the watchdog.
    #[error("fast store transient error: {0}")]
    StoreTransientError(#[source] anyhow::Error),

    /// The handler returned failure. Governed by the retry policy.
    #[error("handler failed: {0}")]
    Handler(String),

    /// A queue entry could not be deserialized. The entry is discarded.
    #[error("failed to decode queue entry: {0}")]
    DecodeError(String),

    /// Worker fetched an id that no longer exists in the durable store.
    #[error("job {0} not found")]
    NotFoundError(crate::job::JobId),
}

impl TickrError {
    /// Whether this error should be surfaced to an HTTP client (as opposed to
    /// absorbed internally by a scheduler/worker loop with logging).
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            TickrError::ClientError(_) | TickrError::StorePersistError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TickrError>;
