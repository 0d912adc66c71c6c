//! Process configuration loaded from environment variables (spec.md §6).

use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Process-wide configuration. Loaded once at startup; the worker count is
/// fixed for the lifetime of one `WorkerPool` (no hot-reload — see
/// DESIGN.md's resolution of the "configurable worker count" open question).
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub worker_count: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// spec's defaults (`:8080`, 5 workers, 3 max attempts, 10s base delay).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            listen_addr: std::env::var("TICKR_LISTEN_ADDR").unwrap_or_else(|_| ":8080".to_string()),
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            worker_count: std::env::var("TICKR_WORKER_COUNT")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("TICKR_WORKER_COUNT must be a valid number")?
                .unwrap_or(tickr_core::DEFAULT_WORKER_COUNT),
            max_attempts: std::env::var("TICKR_MAX_ATTEMPTS")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("TICKR_MAX_ATTEMPTS must be a valid number")?
                .unwrap_or(tickr_core::JobRecord::DEFAULT_MAX_ATTEMPTS),
            retry_base_delay: std::env::var("TICKR_RETRY_BASE_DELAY_SECS")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("TICKR_RETRY_BASE_DELAY_SECS must be a valid number")?
                .map(Duration::from_secs)
                .unwrap_or(tickr_core::DEFAULT_RETRY_BASE_DELAY),
        })
    }

    /// Normalize `listen_addr` to a bindable socket address, turning the Go
    /// convention of a bare `:PORT` into `0.0.0.0:PORT`.
    pub fn bind_addr(&self) -> String {
        if let Some(port) = self.listen_addr.strip_prefix(':') {
            format!("0.0.0.0:{port}")
        } else {
            self.listen_addr.clone()
        }
    }
}
