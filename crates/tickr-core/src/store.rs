//! The narrow persistence interface the scheduler/worker core consumes.
//!
//! `DurableStore` is an external collaborator: the core only ever calls
//! these four operations, and treats the concrete backend (Postgres, an
//! in-memory double, ...) as opaque.

use async_trait::async_trait;

use crate::error::TickrError;
use crate::job::{JobId, JobRecord, QueueEntry};

/// Durable (relational) job storage.
///
/// Each call is a single self-contained transaction; no long-lived
/// transaction spans a scheduler/worker boundary.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist a new record and assign it a fresh, monotonic id.
    async fn insert(&self, record: JobRecord) -> Result<JobId, TickrError>;

    /// Return the current record for `id`, or `NotFoundError` if it does not
    /// exist.
    async fn fetch(&self, id: JobId) -> Result<JobRecord, TickrError>;

    /// Write back status, `workerId`, `attempt`, timestamps, `lastError`, and
    /// `result`. Implementations must clear `workerId` whenever `status` is
    /// not `Executing`, even if the caller forgot.
    async fn update(&self, record: JobRecord) -> Result<(), TickrError>;

    /// Every record whose status is `Pending` or `Retrying`, projected down
    /// to `{id, scheduledAt}`. Used only during recovery.
    async fn list_incomplete(&self) -> Result<Vec<QueueEntry>, TickrError>;
}
