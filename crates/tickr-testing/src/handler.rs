//! A programmable `JobHandler` double: records every invocation and fails a
//! configurable number of times before succeeding, so retry-then-success and
//! permanent-failure scenarios (spec.md §8 scenarios 3, 4) are reproducible
//! without a real job handler.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tickr_core::{JobHandler, JobOutcome, JobRecord};

pub struct RecordingJobHandler {
    invocations: Mutex<Vec<JobRecord>>,
    calls: AtomicU32,
    fail_first_n: u32,
    failure_message: String,
}

impl RecordingJobHandler {
    /// A handler that succeeds on every invocation.
    pub fn always_succeeds() -> Self {
        Self::new(0, "unused")
    }

    /// A handler that fails `fail_first_n` times then succeeds.
    pub fn fails_then_succeeds(fail_first_n: u32, message: impl Into<String>) -> Self {
        Self::new(fail_first_n, message)
    }

    /// A handler that always fails — drives a job to `Failed` once
    /// `maxAttempts` is exhausted, since every failure is attempt-counted.
    pub fn always_fails(message: impl Into<String>) -> Self {
        Self::new(u32::MAX, message)
    }

    fn new(fail_first_n: u32, message: impl Into<String>) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            fail_first_n,
            failure_message: message.into(),
        }
    }

    /// Snapshots of every record this handler has been invoked with, in
    /// invocation order.
    pub fn invocations(&self) -> Vec<JobRecord> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobHandler for RecordingJobHandler {
    async fn execute(&self, record: &mut JobRecord) -> JobOutcome {
        self.invocations.lock().unwrap().push(record.clone());
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);

        if call_index < self.fail_first_n {
            JobOutcome::Failure {
                message: self.failure_message.clone(),
            }
        } else {
            JobOutcome::Success { result: None }
        }
    }
}

/// A handler that sleeps for a fixed duration before succeeding — used to
/// exercise the worker pool's backpressure bound (spec.md §8 scenario 5: N
/// workers, instant jobs whose handler sleeps, at most N `Executing` at
/// once).
pub struct SleepyJobHandler {
    duration: std::time::Duration,
}

impl SleepyJobHandler {
    pub fn new(duration: std::time::Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl JobHandler for SleepyJobHandler {
    async fn execute(&self, _record: &mut JobRecord) -> JobOutcome {
        tokio::time::sleep(self.duration).await;
        JobOutcome::Success { result: None }
    }
}
