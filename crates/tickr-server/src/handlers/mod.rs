//! Built-in demo job handlers, registered by `jobType` string.

mod email;
mod report;

use std::sync::Arc;

use tickr_core::HandlerRegistry;

pub use email::EmailHandler;
pub use report::ReportHandler;

/// The handler registry shipped with the server binary: `email` and
/// `report`, matching `original_source/internal/worker/executor.go`'s
/// `switch job.JobType`.
pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("email", Arc::new(EmailHandler));
    registry.register("report", Arc::new(ReportHandler));
    registry
}
