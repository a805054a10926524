//! In-process substrate with Redis-compatible semantics.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{BackendFuture, KeyValueBackend, WriteBatch, WriteOp};
use crate::error::{Result, StoreError};
use crate::types::Order;

#[derive(Debug, Clone)]
struct StringEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Sorted set ordered by (score, member), like a Redis zset.
#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn upsert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(old, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn pop_lowest(&mut self) -> bool {
        match self.ordered.pop_first() {
            Some((_, member)) => {
                self.scores.remove(&member);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }
}

/// Thread-safe in-memory key/value + sorted-set store.
///
/// Expiry is tracked with [`tokio::time::Instant`], so tests running on a
/// paused clock can advance past a TTL without sleeping.
#[derive(Debug)]
pub struct MemoryBackend {
    strings: RwLock<HashMap<String, StringEntry>>,
    sets: RwLock<HashMap<String, SortedSet>>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strings: RwLock::new(HashMap::new()),
            sets: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the substrate going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Writes raw bytes without expiry, bypassing the codec.
    pub fn put_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.strings.write().insert(
            key.into(),
            StringEntry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Returns the live value of a string key.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.strings
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    /// Returns the score of a sorted-set member.
    #[must_use]
    pub fn score_of(&self, key: &str, member: &str) -> Option<i64> {
        self.sets.read().get(key)?.scores.get(member).copied()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::backend("memory backend marked unavailable"))
        }
    }

    fn apply_now(&self, batch: &WriteBatch) -> Result<()> {
        self.ensure_available()?;
        let now = Instant::now();
        for op in batch.ops() {
            match op {
                WriteOp::SetEx { key, value, ttl } => {
                    self.strings.write().insert(
                        key.clone(),
                        StringEntry {
                            value: value.clone(),
                            expires_at: now.checked_add(*ttl),
                        },
                    );
                }
                WriteOp::ZAdd { key, member, score } => {
                    self.sets
                        .write()
                        .entry(key.clone())
                        .or_default()
                        .upsert(member, *score);
                }
            }
        }
        Ok(())
    }

    fn get_many_now(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.ensure_available()?;
        let now = Instant::now();
        let strings = self.strings.read();
        Ok(keys
            .iter()
            .map(|k| {
                strings
                    .get(k)
                    .filter(|e| e.is_live(now))
                    .map(|e| e.value.clone())
            })
            .collect())
    }

    #[allow(clippy::significant_drop_tightening)]
    fn zrem_below_now(&self, key: &str, threshold: i64) -> Result<u64> {
        self.ensure_available()?;
        let mut sets = self.sets.write();
        let Some(set) = sets.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        while set.ordered.first().is_some_and(|(score, _)| *score < threshold) {
            set.pop_lowest();
            removed += 1;
        }
        if set.len() == 0 {
            sets.remove(key);
        }
        Ok(removed)
    }

    #[allow(clippy::significant_drop_tightening)]
    fn zrem_lowest_now(&self, key: &str, keep: usize) -> Result<u64> {
        self.ensure_available()?;
        let mut sets = self.sets.write();
        let Some(set) = sets.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        while set.len() > keep && set.pop_lowest() {
            removed += 1;
        }
        if set.len() == 0 {
            sets.remove(key);
        }
        Ok(removed)
    }

    fn zrange_now(
        &self,
        key: &str,
        min: i64,
        max: i64,
        limit: usize,
        order: Order,
    ) -> Result<Vec<String>> {
        self.ensure_available()?;
        if min > max || limit == 0 {
            return Ok(Vec::new());
        }
        let sets = self.sets.read();
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };
        let members = match order {
            Order::Ascending => set
                .ordered
                .range((Bound::Included((min, String::new())), Bound::Unbounded))
                .take_while(|(score, _)| *score <= max)
                .take(limit)
                .map(|(_, m)| m.clone())
                .collect(),
            Order::Descending => {
                // (max + 1, "") sorts after every member scored `max`.
                let upper = match max.checked_add(1) {
                    Some(next) => Bound::Excluded((next, String::new())),
                    None => Bound::Unbounded,
                };
                set.ordered
                    .range((Bound::Unbounded, upper))
                    .rev()
                    .take_while(|(score, _)| *score >= min)
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            }
        };
        debug!(key, min, max, limit, %order, "memory zrange");
        Ok(members)
    }

    fn zcard_now(&self, key: &str) -> Result<u64> {
        self.ensure_available()?;
        Ok(self.sets.read().get(key).map_or(0, |s| s.len() as u64))
    }
}

impl KeyValueBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn apply<'a>(&'a self, batch: &'a WriteBatch) -> BackendFuture<'a, ()> {
        Box::pin(async move { self.apply_now(batch) })
    }

    fn get_many<'a>(&'a self, keys: &'a [String]) -> BackendFuture<'a, Vec<Option<Vec<u8>>>> {
        Box::pin(async move { self.get_many_now(keys) })
    }

    fn zrem_below<'a>(&'a self, key: &'a str, threshold: i64) -> BackendFuture<'a, u64> {
        Box::pin(async move { self.zrem_below_now(key, threshold) })
    }

    fn zrem_lowest<'a>(&'a self, key: &'a str, keep: usize) -> BackendFuture<'a, u64> {
        Box::pin(async move { self.zrem_lowest_now(key, keep) })
    }

    fn zrange_by_score<'a>(
        &'a self,
        key: &'a str,
        min: i64,
        max: i64,
        limit: usize,
        order: Order,
    ) -> BackendFuture<'a, Vec<String>> {
        Box::pin(async move { self.zrange_now(key, min, max, limit, order) })
    }

    fn zcard<'a>(&'a self, key: &'a str) -> BackendFuture<'a, u64> {
        Box::pin(async move { self.zcard_now(key) })
    }

    fn ping(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move { self.ensure_available() })
    }
}
