//! The worker pool: N long-lived workers consuming the scheduler's hand-off
//! channel, invoking handlers, and applying the retry policy.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::TickrError;
use crate::job::{JobRecord, JobStatus, QueueEntry};
use crate::store::DurableStore;

/// Default worker count: 5.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Linear backoff base used between retries: `attempt * RETRY_BASE_DELAY`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(10);

/// The result of one handler invocation. Every failure — an unrecognized
/// `jobType`, a bad payload, a handler panic, a transient downstream error —
/// is subject to the same attempt-counted retry/terminal bookkeeping
/// (spec.md §8 P3: `status == Failed` implies `attempt == maxAttempts`).
/// `JobHandler` has no way to mark a failure as exempt from that count.
pub enum JobOutcome {
    Success { result: Option<serde_json::Value> },
    Failure { message: String },
}

/// The single capability the worker pool sees handlers through.
///
/// Implementors may mutate `record.result` during execution; the pool
/// preserves that mutation across the subsequent `update` call regardless of
/// the returned [`JobOutcome`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, record: &mut JobRecord) -> JobOutcome;
}

/// Maps `jobType` strings to handler implementations.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }
}

/// Tunable knobs for the worker pool's retry policy.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub retry_base_delay: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

/// A `DurableStore` + `push_waiting` pair, the exact surface a worker needs
/// from the scheduler without depending on its full type.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    async fn push_waiting(&self, entry: QueueEntry) -> Result<(), TickrError>;
}

pub struct WorkerPool {
    durable: Arc<dyn DurableStore>,
    handlers: Arc<HandlerRegistry>,
    scheduler: Arc<dyn RetryScheduler>,
    handoff_rx: async_channel::Receiver<QueueEntry>,
    shutdown: CancellationToken,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        durable: Arc<dyn DurableStore>,
        handlers: Arc<HandlerRegistry>,
        scheduler: Arc<dyn RetryScheduler>,
        handoff_rx: async_channel::Receiver<QueueEntry>,
        shutdown: CancellationToken,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            durable,
            handlers,
            scheduler,
            handoff_rx,
            shutdown,
            config,
        }
    }

    /// Spawn `config.worker_count` long-lived worker tasks. Returns their
    /// join handles so the caller can await full drain on shutdown: there is
    /// no time bound on worker drain, unlike the HTTP listener's shutdown.
    pub fn spawn(&self) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.config.worker_count)
            .map(|id| {
                let worker = Worker {
                    id: id as u32,
                    durable: self.durable.clone(),
                    handlers: self.handlers.clone(),
                    scheduler: self.scheduler.clone(),
                    handoff_rx: self.handoff_rx.clone(),
                    shutdown: self.shutdown.clone(),
                    retry_base_delay: self.config.retry_base_delay,
                };
                tokio::spawn(async move { worker.run().await })
            })
            .collect()
    }
}

struct Worker {
    id: u32,
    durable: Arc<dyn DurableStore>,
    handlers: Arc<HandlerRegistry>,
    scheduler: Arc<dyn RetryScheduler>,
    handoff_rx: async_channel::Receiver<QueueEntry>,
    shutdown: CancellationToken,
    retry_base_delay: Duration,
}

impl Worker {
    async fn run(&self) {
        info!(worker_id = self.id, "worker idle");
        loop {
            let entry = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                recv = self.handoff_rx.recv() => match recv {
                    Ok(entry) => entry,
                    Err(_) => break, // channel closed: no more producers
                },
            };

            self.handle_one(entry).await;
            info!(worker_id = self.id, "worker idle");
        }
        info!(worker_id = self.id, "worker shutting down");
    }

    async fn handle_one(&self, entry: QueueEntry) {
        let mut record = match self.durable.fetch(entry.id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(worker_id = self.id, job_id = %entry.id, error = %e, "fetch failed, skipping");
                return;
            }
        };

        record.started_at = Some(Utc::now());
        record.finished_at = None;
        record.status = JobStatus::Executing;
        record.worker_id = Some(self.id);
        if let Err(e) = self.durable.update(record.clone()).await {
            error!(worker_id = self.id, job_id = %entry.id, error = %e, "failed to stamp Executing");
            return;
        }

        info!(worker_id = self.id, job_id = %entry.id, job_type = %record.job_type, "executing job");
        let outcome = self.invoke_handler(&mut record).await;

        record.finished_at = Some(Utc::now());
        record.attempt += 1;

        match outcome {
            JobOutcome::Success { result } => {
                record.status = JobStatus::Completed;
                record.last_error = None;
                record.result = result.or(record.result.take());
                record.clear_worker_if_not_executing();
                if let Err(e) = self.durable.update(record).await {
                    error!(worker_id = self.id, job_id = %entry.id, error = %e, "failed to record success");
                }
            }
            JobOutcome::Failure { message } => {
                self.apply_failure(record, message).await;
            }
        }
    }

    async fn invoke_handler(&self, record: &mut JobRecord) -> JobOutcome {
        let handler = match self.handlers.get(&record.job_type) {
            Some(h) => h,
            None => {
                return JobOutcome::Failure {
                    message: format!("no handler registered for job type '{}'", record.job_type),
                };
            }
        };

        // Handler panics must be caught and converted to an error rather
        // than taking the worker loop down with them.
        match AssertUnwindSafe(handler.execute(record)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic);
                error!(job_id = %record.id, panic = %message, "handler panicked");
                JobOutcome::Failure {
                    message: format!("handler panicked: {message}"),
                }
            }
        }
    }

    async fn apply_failure(&self, mut record: JobRecord, message: String) {
        let will_retry = record.attempt < record.max_attempts;

        if will_retry {
            record.status = JobStatus::Retrying;
            record.last_error = Some(message);
            record.clear_worker_if_not_executing();
            let backoff = self.retry_base_delay * record.attempt;
            let retry_at = Utc::now() + chrono::Duration::from_std(backoff).unwrap_or_default();
            record.scheduled_at = retry_at;

            let id = record.id;
            if let Err(e) = self.durable.update(record).await {
                error!(worker_id = self.id, job_id = %id, error = %e, "failed to record retry");
                return;
            }
            if let Err(e) = self
                .scheduler
                .push_waiting(QueueEntry {
                    id,
                    scheduled_at: retry_at,
                })
                .await
            {
                error!(worker_id = self.id, job_id = %id, error = %e, "failed to re-enqueue retry");
            }
        } else {
            record.status = JobStatus::Failed;
            record.last_error = Some(message);
            record.clear_worker_if_not_executing();
            if let Err(e) = self.durable.update(record).await {
                error!(worker_id = self.id, error = %e, "failed to record terminal failure");
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Bridges [`crate::scheduler::Scheduler`] into the narrow [`RetryScheduler`]
/// surface the worker pool needs, so `tickr-core::worker` does not depend on
/// the concrete scheduler type.
pub struct SchedulerHandoff(crate::scheduler::Scheduler);

impl SchedulerHandoff {
    pub fn new(scheduler: crate::scheduler::Scheduler) -> Self {
        Self(scheduler)
    }
}

#[async_trait]
impl RetryScheduler for SchedulerHandoff {
    async fn push_waiting(&self, entry: QueueEntry) -> Result<(), TickrError> {
        self.0.push_waiting(entry).await
    }
}
