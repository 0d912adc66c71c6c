//! The `report` demo handler. A no-op placeholder in
//! `original_source/internal/worker/executor.go`'s `handleReport` too —
//! kept as one here, documented rather than silently dropped.

use async_trait::async_trait;
use tickr_core::{JobHandler, JobOutcome, JobRecord};

pub struct ReportHandler;

#[async_trait]
impl JobHandler for ReportHandler {
    async fn execute(&self, _record: &mut JobRecord) -> JobOutcome {
        JobOutcome::Success { result: None }
    }
}
