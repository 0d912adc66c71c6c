//! The canonical job entity and its compact queue projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job's identity: a monotonic integer assigned by `DurableStore::insert`,
/// per spec.md §3. Never generated client-side.
pub type JobId = i64;

/// Lifecycle status of a [`JobRecord`].
///
/// `Pending` and `Retrying` are the only statuses a [`QueueEntry`] may point
/// at; `Executing` is held by exactly one worker at a time; `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Retrying,
    Executing,
    Completed,
    Failed,
}

/// The durable source of truth for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub worker_id: Option<u32>,
    pub result: Option<serde_json::Value>,
}

impl JobRecord {
    /// Default `maxAttempts`, per spec.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Build a brand-new, not-yet-persisted job record for submission.
    ///
    /// `id` is a placeholder (`0`); `DurableStore::insert` assigns the real,
    /// monotonic id and the caller should use the id it returns, not this
    /// field.
    pub fn new(
        job_type: impl Into<String>,
        payload: serde_json::Value,
        scheduled_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            job_type: job_type.into(),
            payload,
            status: JobStatus::Pending,
            attempt: 0,
            max_attempts,
            scheduled_at,
            created_at: now,
            started_at: None,
            finished_at: None,
            last_error: None,
            worker_id: None,
            result: None,
        }
    }

    /// Project this record down to the compact entry the fast store holds.
    pub fn queue_entry(&self) -> QueueEntry {
        QueueEntry {
            id: self.id,
            scheduled_at: self.scheduled_at,
        }
    }

    /// Invariant 4: workerId must be cleared whenever status leaves Executing.
    pub fn clear_worker_if_not_executing(&mut self) {
        if self.status != JobStatus::Executing {
            self.worker_id = None;
        }
    }
}

/// The compact `{id, scheduledAt}` projection held in the fast store.
///
/// Sufficient for the scheduler to order and hand off work; the worker
/// re-fetches the full [`JobRecord`] by id when it picks up the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: JobId,
    pub scheduled_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Unix-seconds score used as the `WAITING` sorted-set key.
    pub fn score(&self) -> f64 {
        self.scheduled_at.timestamp() as f64
    }

    pub fn encode(&self) -> Vec<u8> {
        // Infallible: QueueEntry contains no non-serializable types.
        serde_json::to_vec(self).expect("QueueEntry is always serializable")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, crate::error::TickrError> {
        serde_json::from_slice(bytes)
            .map_err(|e| crate::error::TickrError::DecodeError(e.to_string()))
    }
}
