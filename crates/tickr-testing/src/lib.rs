//! In-memory `DurableStore`/`FastStore`/`JobHandler` test doubles for
//! `tickr-core`.
//!
//! Lets the scheduler/worker pool machinery run its full data flow —
//! including crash recovery — without a Postgres or Redis instance, the way
//! the teacher workspace's dedicated testing crate backs the rest of its
//! crates' test suites.

mod durable;
mod fast;
mod handler;

pub use durable::InMemoryDurableStore;
pub use fast::InMemoryFastStore;
pub use handler::{RecordingJobHandler, SleepyJobHandler};
