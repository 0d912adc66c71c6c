//! The ingress adapter (spec.md §4.6): translates an external job
//! submission into a `DurableStore::insert` followed by the matching
//! `Scheduler::push_{ready,waiting}` call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tickr_core::{DurableStore, JobId, JobRecord, JobStatus, Scheduler, TickrError};
use tracing::warn;

/// `POST /api/v1/jobs/` request body.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub jobtype: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub delay: i64,
}

/// `POST /api/v1/jobs/` response payload.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    pub status: &'static str,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: DateTime<Utc>,
}

pub struct IngressAdapter {
    durable: Arc<dyn DurableStore>,
    scheduler: Scheduler,
    max_attempts: u32,
}

impl IngressAdapter {
    pub fn new(durable: Arc<dyn DurableStore>, scheduler: Scheduler, max_attempts: u32) -> Self {
        Self {
            durable,
            scheduler,
            max_attempts,
        }
    }

    /// Compute `scheduledAt = now + delaySeconds`, persist, and route the
    /// new job onto `READY` (delay == 0) or `WAITING` (delay > 0).
    pub async fn submit(&self, req: SubmitJobRequest) -> Result<SubmitJobResponse, TickrError> {
        if req.jobtype.trim().is_empty() {
            return Err(TickrError::ClientError("jobtype must not be empty".to_string()));
        }
        if req.delay < 0 {
            return Err(TickrError::ClientError("delay must not be negative".to_string()));
        }

        let now = Utc::now();
        let scheduled_at = now + chrono::Duration::seconds(req.delay);

        let record = JobRecord::new(req.jobtype, req.payload, scheduled_at, self.max_attempts);
        let id = self.durable.insert(record).await?;
        let entry = tickr_core::QueueEntry { id, scheduled_at };

        // The record is already durable at this point. A fast-store push
        // failure here is a StoreTransientError (§7): logged, never
        // surfaced to the client — the job simply waits for the next
        // recovery pass to pick it up from `listIncomplete`.
        let push_result = if req.delay > 0 {
            self.scheduler.push_waiting(entry).await
        } else {
            self.scheduler.push_ready(entry).await
        };
        if let Err(e) = push_result {
            warn!(job_id = %id, error = %e, "failed to push newly submitted job onto fast store, relying on recovery");
        }

        Ok(SubmitJobResponse {
            job_id: id,
            status: status_label(JobStatus::Pending),
            scheduled_at,
        })
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Retrying => "retrying",
        JobStatus::Executing => "executing",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}
