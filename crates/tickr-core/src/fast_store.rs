//! The minimal list + sorted-set capability set the scheduler needs from a
//! fast, volatile store.
//!
//! `FastStore` is an external collaborator: the durable store is
//! authoritative, this is a cache of scheduling state that can be rebuilt by
//! recovery after total loss.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TickrError;

/// Sorted-set member returned with its score, used for
/// `sorted_range_with_scores(key, 0, 0)` (smallest-score lookup).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: Vec<u8>,
    pub score: f64,
}

/// A minimal Redis-shaped capability set: two named collections (a FIFO list
/// and a sorted set) plus a plain key for the epoch marker.
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Prepend `bytes` to the FIFO list at `key`.
    async fn list_push_head(&self, key: &str, bytes: Vec<u8>) -> Result<(), TickrError>;

    /// Block up to `timeout` (`None` = indefinite) for an element at the
    /// tail of the FIFO list at `key`; returns `None` on timeout.
    async fn list_blocking_pop_tail(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, TickrError>;

    /// Insert `member` into the sorted set at `key` with `score`. A
    /// duplicate member retains a single entry with the latest score.
    async fn sorted_add(&self, key: &str, score: f64, member: Vec<u8>) -> Result<(), TickrError>;

    /// All members whose score lies in `[min, max]`, ascending by score.
    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<Vec<u8>>, TickrError>;

    /// The single element with the smallest score, or `None` if the set is
    /// empty. Named after the `(key, 0, 0)` range-by-rank call this models.
    async fn sorted_min(&self, key: &str) -> Result<Option<ScoredMember>, TickrError>;

    /// Remove exactly `member` from the sorted set at `key`.
    async fn sorted_remove(&self, key: &str, member: &[u8]) -> Result<(), TickrError>;

    /// Whether `key` currently has a value.
    async fn key_exists(&self, key: &str) -> Result<bool, TickrError>;

    /// Set `key` to `value` (no expiry).
    async fn key_set(&self, key: &str, value: Vec<u8>) -> Result<(), TickrError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), TickrError>;
}

/// Well-known fast-store keys.
pub mod keys {
    pub const WAITING: &str = "tickr:queue:waiting";
    pub const READY: &str = "tickr:queue:ready";
    pub const EPOCH: &str = "tickr:redis:epoch";
}
