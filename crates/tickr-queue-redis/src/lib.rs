//! Redis-backed [`FastStore`].
//!
//! A thin wrapper over [`redis::aio::ConnectionManager`] (the same
//! auto-reconnecting async client the retrieval pack's Redis-backed queue
//! crates use) translating each [`FastStore`] operation into the Redis
//! command `original_source/internal/queue/redis.go` and
//! `internal/scheduler/redis.go` used: `LPUSH`/`BRPOP` for the ready list,
//! `ZADD`/`ZRANGEBYSCORE`/`ZREM` for the waiting set.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tickr_core::{FastStore, ScoredMember, TickrError};

/// Redis implementation of [`FastStore`]. Cheap to clone: the inner
/// `ConnectionManager` is itself cloneable and multiplexes over one
/// connection per clone lazily.
#[derive(Clone)]
pub struct RedisFastStore {
    conn: ConnectionManager,
}

impl RedisFastStore {
    /// Connect (lazily reconnecting on failure) to the Redis instance at
    /// `url`, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self, TickrError> {
        let client = redis::Client::open(url).map_err(to_transient)?;
        let conn = ConnectionManager::new(client).await.map_err(to_transient)?;
        Ok(Self { conn })
    }
}

fn to_transient(e: RedisError) -> TickrError {
    TickrError::StoreTransientError(e.into())
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn list_push_head(&self, key: &str, bytes: Vec<u8>) -> Result<(), TickrError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, bytes).await.map_err(to_transient)
    }

    async fn list_blocking_pop_tail(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, TickrError> {
        // BRPOP's own timeout of 0 means "block indefinitely", matching
        // spec.md §4.2's `timeout` (0 = indefinite) contract directly.
        let timeout_secs = timeout.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        let mut conn = self.conn.clone();
        let popped: Option<(String, Vec<u8>)> =
            conn.brpop(key, timeout_secs).await.map_err(to_transient)?;
        Ok(popped.map(|(_key, value)| value))
    }

    async fn sorted_add(&self, key: &str, score: f64, member: Vec<u8>) -> Result<(), TickrError> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .map_err(to_transient)
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<Vec<u8>>, TickrError> {
        let mut conn = self.conn.clone();
        conn.zrangebyscore(key, min, max).await.map_err(to_transient)
    }

    async fn sorted_min(&self, key: &str) -> Result<Option<ScoredMember>, TickrError> {
        let mut conn = self.conn.clone();
        let result: Vec<(Vec<u8>, f64)> =
            conn.zrange_withscores(key, 0, 0).await.map_err(to_transient)?;
        Ok(result
            .into_iter()
            .next()
            .map(|(member, score)| ScoredMember { member, score }))
    }

    async fn sorted_remove(&self, key: &str, member: &[u8]) -> Result<(), TickrError> {
        let mut conn = self.conn.clone();
        conn.zrem::<_, _, ()>(key, member).await.map_err(to_transient)
    }

    async fn key_exists(&self, key: &str) -> Result<bool, TickrError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(to_transient)
    }

    async fn key_set(&self, key: &str, value: Vec<u8>) -> Result<(), TickrError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(to_transient)
    }

    async fn ping(&self) -> Result<(), TickrError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(to_transient)?;
        Ok(())
    }
}
