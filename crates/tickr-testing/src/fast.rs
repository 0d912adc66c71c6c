//! An in-process `FastStore` double: a `VecDeque` FIFO list, a score-sorted
//! member map, and a plain key/value map, guarded by a single mutex with a
//! `Notify` to implement blocking pop with a timeout.
//!
//! Exercises the same two-stage-queue machinery a Redis-backed
//! `FastStore` would, without requiring a Redis instance — the scheduler and
//! worker pool cannot tell the difference.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tickr_core::{fast_store::keys, FastStore, ScoredMember, TickrError};
use tokio::sync::Notify;

#[derive(Default)]
struct State {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    sorted_sets: HashMap<String, Vec<(Vec<u8>, f64)>>,
    plain: HashMap<String, Vec<u8>>,
}

pub struct InMemoryFastStore {
    state: Mutex<State>,
    pushed: Notify,
    /// When set, every operation except `key_exists`/`key_set` returns a
    /// transient error — used to exercise the scheduler's watchdog/recovery
    /// path without a real Redis outage.
    failing: AtomicBool,
}

impl Default for InMemoryFastStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            pushed: Notify::new(),
            failing: AtomicBool::new(false),
        }
    }
}

impl InMemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a fast-store outage (or its recovery) for watchdog tests.
    /// Wakes any task blocked in `list_blocking_pop_tail` so it observes the
    /// new state immediately rather than waiting for the next push.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
        self.pushed.notify_waiters();
    }

    /// Simulate total loss of scheduling state (spec.md §8 scenario 6): drop
    /// the waiting set, ready list, and epoch marker, leaving the durable
    /// store as the only surviving source of truth.
    pub fn wipe(&self) {
        let mut state = self.state.lock().unwrap();
        state.lists.remove(keys::READY);
        state.sorted_sets.remove(keys::WAITING);
        state.plain.remove(keys::EPOCH);
    }

    fn check_failing(&self) -> Result<(), TickrError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(TickrError::StoreTransientError(anyhow::anyhow!(
                "simulated fast-store outage"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FastStore for InMemoryFastStore {
    async fn list_push_head(&self, key: &str, bytes: Vec<u8>) -> Result<(), TickrError> {
        self.check_failing()?;
        let mut state = self.state.lock().unwrap();
        state.lists.entry(key.to_string()).or_default().push_front(bytes);
        drop(state);
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn list_blocking_pop_tail(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, TickrError> {
        loop {
            self.check_failing()?;
            {
                let mut state = self.state.lock().unwrap();
                if let Some(list) = state.lists.get_mut(key) {
                    if let Some(bytes) = list.pop_back() {
                        return Ok(Some(bytes));
                    }
                }
            }

            let notified = self.pushed.notified();
            match timeout {
                Some(d) => {
                    if tokio::time::timeout(d, notified).await.is_err() {
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn sorted_add(&self, key: &str, score: f64, member: Vec<u8>) -> Result<(), TickrError> {
        self.check_failing()?;
        let mut state = self.state.lock().unwrap();
        let set = state.sorted_sets.entry(key.to_string()).or_default();
        if let Some(existing) = set.iter_mut().find(|(m, _)| *m == member) {
            existing.1 = score;
        } else {
            set.push((member, score));
        }
        Ok(())
    }

    async fn sorted_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<Vec<u8>>, TickrError> {
        self.check_failing()?;
        let state = self.state.lock().unwrap();
        let mut matches: Vec<(Vec<u8>, f64)> = state
            .sorted_sets
            .get(key)
            .map(|set| {
                set.iter()
                    .filter(|(_, score)| *score >= min && *score <= max)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        Ok(matches.into_iter().map(|(member, _)| member).collect())
    }

    async fn sorted_min(&self, key: &str) -> Result<Option<ScoredMember>, TickrError> {
        self.check_failing()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .sorted_sets
            .get(key)
            .and_then(|set| {
                set.iter()
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                    .cloned()
            })
            .map(|(member, score)| ScoredMember { member, score }))
    }

    async fn sorted_remove(&self, key: &str, member: &[u8]) -> Result<(), TickrError> {
        self.check_failing()?;
        let mut state = self.state.lock().unwrap();
        if let Some(set) = state.sorted_sets.get_mut(key) {
            set.retain(|(m, _)| m != member);
        }
        Ok(())
    }

    async fn key_exists(&self, key: &str) -> Result<bool, TickrError> {
        self.check_failing()?;
        Ok(self.state.lock().unwrap().plain.contains_key(key))
    }

    async fn key_set(&self, key: &str, value: Vec<u8>) -> Result<(), TickrError> {
        self.check_failing()?;
        self.state.lock().unwrap().plain.insert(key.to_string(), value);
        Ok(())
    }

    async fn ping(&self) -> Result<(), TickrError> {
        self.check_failing()
    }
}
