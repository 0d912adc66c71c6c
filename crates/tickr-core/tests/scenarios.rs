//! End-to-end scenarios from spec.md §8, driven against the in-memory
//! `DurableStore`/`FastStore` doubles in `tickr-testing` so the full
//! scheduler/worker pool data flow runs without Postgres or Redis.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tickr_core::worker::SchedulerHandoff;
use tickr_core::{
    DurableStore, FastStore, HandlerRegistry, JobHandler, JobId, JobRecord, JobStatus, QueueEntry,
    Scheduler, WorkerPool, WorkerPoolConfig,
};
use tickr_testing::{InMemoryDurableStore, InMemoryFastStore, RecordingJobHandler, SleepyJobHandler};

/// Wires a scheduler + worker pool over the in-memory doubles, with a
/// single registered handler. Tests poll `durable` directly for outcomes.
struct Harness {
    durable: Arc<InMemoryDurableStore>,
    fast: Arc<InMemoryFastStore>,
    scheduler: Scheduler,
    _worker_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Harness {
    async fn new(job_type: &str, handler: Arc<dyn JobHandler>, config: WorkerPoolConfig) -> Self {
        let durable = Arc::new(InMemoryDurableStore::new());
        let fast = Arc::new(InMemoryFastStore::new());

        let durable_dyn: Arc<dyn DurableStore> = durable.clone();
        let fast_dyn: Arc<dyn FastStore> = fast.clone();

        let (scheduler, handoff_rx) = Scheduler::new(durable_dyn.clone(), fast_dyn);
        scheduler.start().await.expect("scheduler start (recovery)");

        let mut registry = HandlerRegistry::new();
        registry.register(job_type, handler);

        let pool = WorkerPool::new(
            durable_dyn,
            Arc::new(registry),
            Arc::new(SchedulerHandoff::new(scheduler.clone())),
            handoff_rx,
            scheduler.shutdown_token(),
            config,
        );
        let worker_handles = pool.spawn();

        Self {
            durable,
            fast,
            scheduler,
            _worker_handles: worker_handles,
        }
    }

    /// Mirrors the ingress adapter (spec.md §4.6): insert, then route to
    /// `READY` or `WAITING` depending on delay.
    async fn submit(&self, job_type: &str, delay_secs: i64, max_attempts: u32) -> JobId {
        let scheduled_at = Utc::now() + chrono::Duration::seconds(delay_secs);
        let record = JobRecord::new(job_type, json!({}), scheduled_at, max_attempts);
        let id = self.durable.insert(record).await.expect("insert");
        let entry = QueueEntry { id, scheduled_at };
        if delay_secs > 0 {
            self.scheduler.push_waiting(entry).await.expect("push_waiting");
        } else {
            self.scheduler.push_ready(entry).await.expect("push_ready");
        }
        id
    }

    async fn fetch(&self, id: JobId) -> JobRecord {
        self.durable.fetch(id).await.expect("fetch")
    }
}

/// Poll `cond` every 10ms until it returns `true` or `timeout` elapses.
async fn wait_until<F, Fut>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn immediate_success() {
    let handler = Arc::new(RecordingJobHandler::always_succeeds());
    let harness = Harness::new("email", handler.clone(), WorkerPoolConfig::default()).await;

    let id = harness.submit("email", 0, 3).await;

    let completed = wait_until(Duration::from_secs(2), || async {
        harness.fetch(id).await.status == JobStatus::Completed
    })
    .await;
    assert!(completed, "job never completed");

    let record = harness.fetch(id).await;
    assert_eq!(record.attempt, 1);
    assert!(record.started_at.unwrap() <= record.finished_at.unwrap());
    assert!(record.worker_id.is_none());
}

#[tokio::test]
async fn delayed_success() {
    let handler = Arc::new(RecordingJobHandler::always_succeeds());
    let harness = Harness::new("email", handler.clone(), WorkerPoolConfig::default()).await;

    let id = harness.submit("email", 1, 3).await;

    // Shortly after submission the job is still waiting, not yet executed.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.fetch(id).await.status, JobStatus::Pending);

    let completed = wait_until(Duration::from_secs(3), || async {
        harness.fetch(id).await.status == JobStatus::Completed
    })
    .await;
    assert!(completed, "delayed job never completed");
}

#[tokio::test]
async fn retry_then_success() {
    let handler = Arc::new(RecordingJobHandler::fails_then_succeeds(1, "transient failure"));
    let config = WorkerPoolConfig {
        worker_count: 1,
        retry_base_delay: Duration::from_millis(100),
    };
    let harness = Harness::new("email", handler.clone(), config).await;

    let id = harness.submit("email", 0, 3).await;

    let completed = wait_until(Duration::from_secs(3), || async {
        harness.fetch(id).await.status == JobStatus::Completed
    })
    .await;
    assert!(completed, "job never recovered after retry");

    let record = harness.fetch(id).await;
    assert_eq!(record.attempt, 2);
    assert!(record.last_error.is_none());
    assert_eq!(handler.call_count(), 2);
}

#[tokio::test]
async fn permanent_failure_after_max_attempts() {
    let handler = Arc::new(RecordingJobHandler::always_fails("boom"));
    let config = WorkerPoolConfig {
        worker_count: 1,
        retry_base_delay: Duration::from_millis(50),
    };
    let harness = Harness::new("email", handler.clone(), config).await;

    let id = harness.submit("email", 0, 2).await;

    let failed = wait_until(Duration::from_secs(3), || async {
        harness.fetch(id).await.status == JobStatus::Failed
    })
    .await;
    assert!(failed, "job never reached terminal Failed");

    let record = harness.fetch(id).await;
    assert_eq!(record.attempt, 2);
    assert_eq!(record.last_error.as_deref(), Some("boom"));

    // One job's exhaustion doesn't block the pool: a second submission
    // through the same worker pool still runs to its own terminal state.
    let second_id = harness.submit("email", 0, 2).await;
    let second_failed = wait_until(Duration::from_secs(3), || async {
        harness.fetch(second_id).await.status == JobStatus::Failed
    })
    .await;
    assert!(second_failed, "pool stalled after a prior job's permanent failure");
}

#[tokio::test]
async fn backpressure_bounds_concurrency_to_worker_count() {
    let handler = Arc::new(SleepyJobHandler::new(Duration::from_millis(300)));
    let config = WorkerPoolConfig {
        worker_count: 2,
        retry_base_delay: Duration::from_millis(50),
    };
    let harness = Harness::new("sleep", handler, config).await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(harness.submit("sleep", 0, 3).await);
    }

    let start = tokio::time::Instant::now();
    let mut max_concurrent_executing = 0usize;
    loop {
        let executing = futures::future::join_all(ids.iter().map(|id| harness.fetch(*id)))
            .await
            .iter()
            .filter(|r| r.status == JobStatus::Executing)
            .count();
        max_concurrent_executing = max_concurrent_executing.max(executing);

        let all_done = futures::future::join_all(ids.iter().map(|id| harness.fetch(*id)))
            .await
            .iter()
            .all(|r| r.status == JobStatus::Completed);
        if all_done || start.elapsed() > Duration::from_secs(5) {
            assert!(all_done, "not all jobs completed within the time budget");
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(
        max_concurrent_executing <= 2,
        "observed {max_concurrent_executing} concurrently executing jobs, worker count is 2"
    );
}

#[tokio::test]
async fn recovery_rebuilds_waiting_set_after_fast_store_wipe() {
    let handler = Arc::new(RecordingJobHandler::always_succeeds());
    let harness = Harness::new("email", handler, WorkerPoolConfig::default()).await;

    // Delay far enough out that none of these promote to READY during the
    // test, isolating the recovery rebuild from the timer loop.
    let ids: Vec<JobId> = futures::future::join_all(
        (0..3).map(|_| harness.submit("email", 3600, 3)),
    )
    .await;

    harness.fast.wipe();
    harness.scheduler.recover_if_needed().await.expect("recovery");

    let waiting = harness
        .fast
        .sorted_range_by_score(
            tickr_core::fast_store::keys::WAITING,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .await
        .expect("sorted_range_by_score");
    assert_eq!(waiting.len(), 3);

    let decoded: Vec<JobId> = waiting
        .iter()
        .map(|raw| QueueEntry::decode(raw).unwrap().id)
        .collect();
    for id in &ids {
        assert!(decoded.contains(id), "recovered entries missing job {id}");
    }

    // Re-running recovery immediately after is a no-op (P6): still 3
    // entries, set-equal.
    harness.scheduler.recover_if_needed().await.expect("second recovery");
    let waiting_again = harness
        .fast
        .sorted_range_by_score(
            tickr_core::fast_store::keys::WAITING,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .await
        .expect("sorted_range_by_score");
    assert_eq!(waiting_again.len(), 3);
}

#[tokio::test]
async fn distinct_submissions_get_distinct_ids_and_lifecycles() {
    let handler = Arc::new(RecordingJobHandler::always_succeeds());
    let harness = Harness::new("email", handler, WorkerPoolConfig::default()).await;

    let first = harness.submit("email", 0, 3).await;
    let second = harness.submit("email", 0, 3).await;
    assert_ne!(first, second);

    for id in [first, second] {
        let completed = wait_until(Duration::from_secs(2), || async {
            harness.fetch(id).await.status == JobStatus::Completed
        })
        .await;
        assert!(completed);
    }
}
