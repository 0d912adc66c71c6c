//! The scheduler: owns the waiting set, promotes due jobs to the ready
//! list, and hands ready entries off to the worker pool.
//!
//! This is the hard engineering the rest of the crate exists to support: the
//! two-stage queue, the wake-up protocol, the single-producer/multi-consumer
//! hand-off, and crash recovery. See module docs on [`crate::worker`] for the
//! pool side of the hand-off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TickrError;
use crate::fast_store::{keys, FastStore};
use crate::job::QueueEntry;
use crate::store::DurableStore;

/// How long the watchdog waits between `ping` attempts while the fast store
/// is unreachable.
const WATCHDOG_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// How long the ready-pop loop backs off after a transient fast-store error
/// before retrying the pop.
const READY_POP_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Shared scheduler state. Cheaply cloneable; clone to hand a handle to
/// spawned tasks.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    durable: Arc<dyn DurableStore>,
    fast: Arc<dyn FastStore>,
    /// Coalescing wake signal for the timer loop: a single stored permit is
    /// enough, since multiple enqueues between two timer-loop iterations
    /// collapse into one wake-up and the loop always re-reads the minimum
    /// anyway.
    wake: Notify,
    shutdown: CancellationToken,
    /// Guards concurrent recovery runs: at most one recovery executes at a
    /// time.
    recovering: AtomicBool,
    /// Single-producer (ready-pop loop) / multi-consumer (workers) hand-off.
    /// Zero capacity: a send only completes once a worker is ready to
    /// receive, which is the core backpressure mechanism.
    handoff_tx: async_channel::Sender<QueueEntry>,
}

impl Scheduler {
    /// Construct a scheduler and the receiving half of its hand-off channel.
    /// Pass the receiver (cloned once per worker) to [`crate::worker::WorkerPool`].
    pub fn new(
        durable: Arc<dyn DurableStore>,
        fast: Arc<dyn FastStore>,
    ) -> (Self, async_channel::Receiver<QueueEntry>) {
        let (handoff_tx, handoff_rx) = async_channel::bounded(0);
        let scheduler = Self {
            inner: Arc::new(Inner {
                durable,
                fast,
                wake: Notify::new(),
                shutdown: CancellationToken::new(),
                recovering: AtomicBool::new(false),
                handoff_tx,
            }),
        };
        (scheduler, handoff_rx)
    }

    /// Signal shutdown to every loop driven by this scheduler. Loops observe
    /// the signal at their next suspension point.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// A clone of the scheduler's cancellation token, so the worker pool
    /// (and any other dependent long-lived task) can observe the same
    /// shutdown signal without polling.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Run recovery if the fast store shows no epoch marker, then start the
    /// timer loop and ready-pop loop. Returns once both are spawned; the
    /// returned handles should be awaited by the caller during shutdown.
    pub async fn start(&self) -> Result<(tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>), TickrError> {
        self.recover_if_needed().await?;

        let timer = {
            let this = self.clone();
            tokio::spawn(async move { this.run_timer_loop().await })
        };
        let ready_pop = {
            let this = self.clone();
            tokio::spawn(async move { this.run_ready_pop_loop().await })
        };

        Ok((timer, ready_pop))
    }

    // ---------------------------------------------------------------
    // Public enqueue operations
    // ---------------------------------------------------------------

    /// Push an entry directly onto `READY`. No wake needed: the ready-pop
    /// loop is already blocked on the list.
    pub async fn push_ready(&self, entry: QueueEntry) -> Result<(), TickrError> {
        self.inner
            .fast
            .list_push_head(keys::READY, entry.encode())
            .await
    }

    /// Push an entry onto `WAITING` and wake the timer loop. The wake is
    /// non-blocking/coalescing: see [`Inner::wake`].
    pub async fn push_waiting(&self, entry: QueueEntry) -> Result<(), TickrError> {
        self.inner
            .fast
            .sorted_add(keys::WAITING, entry.score(), entry.encode())
            .await?;
        self.inner.wake.notify_one();
        Ok(())
    }

    // ---------------------------------------------------------------
    // Waiting-set timer loop
    // ---------------------------------------------------------------

    async fn run_timer_loop(&self) {
        info!("scheduler timer loop started");
        loop {
            if self.inner.shutdown.is_cancelled() {
                break;
            }

            let due_at = match self.inner.fast.sorted_min(keys::WAITING).await {
                Ok(Some(scored)) => {
                    let secs = scored.score as i64;
                    chrono::DateTime::from_timestamp(secs, 0)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "timer loop: sorted_min failed, backing off");
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(READY_POP_RETRY_BACKOFF) => continue,
                    }
                }
            };

            match due_at {
                None => {
                    // Nothing waiting: block until shutdown or a new enqueue.
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => break,
                        _ = self.inner.wake.notified() => continue,
                    }
                }
                Some(scheduled_at) => {
                    let now = Utc::now();
                    let delay = (scheduled_at - now).to_std().unwrap_or(Duration::ZERO);
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => break,
                        _ = self.inner.wake.notified() => continue,
                        _ = tokio::time::sleep(delay) => {
                            if let Err(e) = self.promote_due_jobs().await {
                                warn!(error = %e, "timer loop: failed to promote due jobs");
                            }
                        }
                    }
                }
            }
        }
        info!("scheduler timer loop stopped");
    }

    /// Move every `WAITING` entry whose score is `<= now` onto `READY`.
    /// Push precedes remove: a crash between the two duplicates the entry on
    /// recovery rather than losing it, in keeping with at-least-once
    /// delivery.
    async fn promote_due_jobs(&self) -> Result<(), TickrError> {
        let now = (Utc::now().timestamp()) as f64;
        let raw_entries = self
            .inner
            .fast
            .sorted_range_by_score(keys::WAITING, f64::NEG_INFINITY, now)
            .await?;

        for raw in raw_entries {
            match QueueEntry::decode(&raw) {
                Ok(entry) => {
                    self.inner.fast.list_push_head(keys::READY, entry.encode()).await?;
                    self.inner.fast.sorted_remove(keys::WAITING, &raw).await?;
                    debug!(job_id = %entry.id, "promoted job from waiting to ready");
                }
                Err(e) => {
                    warn!(error = %e, "discarding undecodable waiting-set entry");
                    self.inner.fast.sorted_remove(keys::WAITING, &raw).await?;
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Ready hand-off
    // ---------------------------------------------------------------

    async fn run_ready_pop_loop(&self) {
        info!("scheduler ready-pop loop started");
        loop {
            if self.inner.shutdown.is_cancelled() {
                break;
            }

            let popped = tokio::select! {
                _ = self.inner.shutdown.cancelled() => break,
                res = self.inner.fast.list_blocking_pop_tail(keys::READY, None) => res,
            };

            match popped {
                Ok(Some(bytes)) => match QueueEntry::decode(&bytes) {
                    Ok(entry) => {
                        tokio::select! {
                            _ = self.inner.shutdown.cancelled() => break,
                            send_res = self.inner.handoff_tx.send(entry) => {
                                if send_res.is_err() {
                                    // All worker receivers dropped; nothing left to hand off to.
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "discarding undecodable ready-list entry"),
                },
                Ok(None) => {
                    // Defensive: an indefinite blocking pop should not return
                    // empty, but don't spin if a `FastStore` impl ever does.
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "ready-pop loop: transient fast-store error");
                    self.watchdog().await;
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(READY_POP_RETRY_BACKOFF) => {}
                    }
                }
            }
        }
        info!("scheduler ready-pop loop stopped");
    }

    // ---------------------------------------------------------------
    // Recovery
    // ---------------------------------------------------------------

    /// Ping the fast store until it responds, wake the timer loop once it
    /// does, then re-run recovery if the epoch marker was lost.
    async fn watchdog(&self) {
        loop {
            if self.inner.shutdown.is_cancelled() {
                return;
            }
            match self.inner.fast.ping().await {
                Ok(()) => break,
                Err(_) => {
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(WATCHDOG_RETRY_INTERVAL) => {}
                    }
                }
            }
        }
        self.inner.wake.notify_one();

        match self.inner.fast.key_exists(keys::EPOCH).await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.recover_if_needed().await {
                    warn!(error = %e, "post-watchdog recovery failed");
                }
            }
            Err(e) => warn!(error = %e, "watchdog: failed to check epoch after reconnect"),
        }
    }

    /// Rebuild `WAITING` from the durable store if the epoch marker is
    /// absent. Idempotent: re-inserting an entry with the same score is a
    /// no-op, and `Executing` jobs are never listed, so they are never
    /// duplicated. Guarded so at most one recovery runs at a time.
    pub async fn recover_if_needed(&self) -> Result<(), TickrError> {
        if self
            .inner
            .recovering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("recovery already in progress, skipping");
            return Ok(());
        }

        let result = self.run_recovery().await;
        self.inner.recovering.store(false, Ordering::SeqCst);
        result
    }

    async fn run_recovery(&self) -> Result<(), TickrError> {
        if self.inner.fast.key_exists(keys::EPOCH).await? {
            return Ok(());
        }

        info!("fast store epoch marker missing, running recovery");
        let incomplete = self.inner.durable.list_incomplete().await?;
        let count = incomplete.len();
        for entry in incomplete {
            self.push_waiting(entry).await?;
        }

        let now = Utc::now().timestamp().to_string();
        self.inner.fast.key_set(keys::EPOCH, now.into_bytes()).await?;
        info!(recovered = count, "recovery complete");
        Ok(())
    }
}
