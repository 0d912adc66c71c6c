//! The `email` demo handler, ported from
//! `original_source/internal/worker/executor.go`'s `handleEmail`: validates
//! a `{to, from, body}` JSON payload and simulates sending.

use async_trait::async_trait;
use serde::Deserialize;
use tickr_core::{JobHandler, JobOutcome, JobRecord};
use tracing::info;

#[derive(Debug, Deserialize)]
struct EmailPayload {
    to: String,
    from: String,
    body: String,
}

pub struct EmailHandler;

#[async_trait]
impl JobHandler for EmailHandler {
    async fn execute(&self, record: &mut JobRecord) -> JobOutcome {
        let email: EmailPayload = match serde_json::from_value(record.payload.clone()) {
            Ok(email) => email,
            Err(e) => {
                return JobOutcome::Failure {
                    message: format!("invalid email payload: {e}"),
                }
            }
        };

        info!(to = %email.to, from = %email.from, "sending email");
        record.result = Some(serde_json::json!({ "sent_to": email.to, "body": email.body }));

        JobOutcome::Success {
            result: record.result.clone(),
        }
    }
}
