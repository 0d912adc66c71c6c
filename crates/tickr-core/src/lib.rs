//! # tickr-core
//!
//! The scheduler/dispatcher core of a durable, delayed-and-retryable job
//! execution service: the two-stage waiting→ready queue, the wake-up
//! protocol, the single-producer/multi-consumer hand-off into a bounded
//! worker pool, the retry loop, and crash recovery from the durable store.
//!
//! This crate defines the core's two external collaborators as traits
//! ([`DurableStore`], [`FastStore`]) and owns everything downstream of them:
//! the job entity and its state machine ([`job`]), the scheduler
//! ([`scheduler`]), and the worker pool ([`worker`]). Concrete store
//! implementations (Postgres, Redis, in-memory test doubles) and the HTTP
//! ingress adapter live in sibling crates.
//!
//! ## Data flow
//!
//! ```text
//! submit ─▶ DurableStore::insert ─▶ Scheduler::push_{waiting,ready}
//!                                        │
//!                     (waiting) timer elapses, entry promoted to ready
//!                                        │
//!                         Scheduler pops ready ─▶ hand-off channel
//!                                        │
//!                                   Worker picks up
//!                                        │
//!                    invoke handler ─▶ update DurableStore
//!                                        │
//!                (transient failure) re-enqueue to waiting with backoff
//! ```

pub mod error;
pub mod fast_store;
pub mod job;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use error::{Result, TickrError};
pub use fast_store::{keys, FastStore, ScoredMember};
pub use job::{JobId, JobRecord, JobStatus, QueueEntry};
pub use scheduler::Scheduler;
pub use store::DurableStore;
pub use worker::{
    HandlerRegistry, JobHandler, JobOutcome, RetryScheduler, SchedulerHandoff, WorkerPool,
    WorkerPoolConfig, DEFAULT_RETRY_BASE_DELAY, DEFAULT_WORKER_COUNT,
};
