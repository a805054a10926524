//! Key/value + sorted-set substrate used by the store.
//!
//! This module provides the [`KeyValueBackend`] trait, the seam between the
//! store and the engine that actually holds the data, along with two
//! implementations:
//!
//! - [`RedisBackend`]: the production substrate
//! - [`MemoryBackend`]: an in-process substrate for tests and local runs
//!
//! Only the commands the store needs are modelled: expiring string writes,
//! multi-get, and a handful of sorted-set operations.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::Result;
use crate::types::Order;

mod memory;
mod redis_backend;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

/// Boxed future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A single write submitted as part of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Set a string key with an expiry.
    SetEx {
        /// Key to write.
        key: String,
        /// Encoded value.
        value: Vec<u8>,
        /// Time to live.
        ttl: Duration,
    },
    /// Upsert a member of a sorted set.
    ZAdd {
        /// Sorted-set key.
        key: String,
        /// Member to add or move.
        member: String,
        /// New score.
        score: i64,
    },
}

/// An ordered list of writes submitted together.
///
/// Operations are applied in insertion order on a single connection. The
/// batch is not atomic: a failure part-way through may leave earlier writes
/// applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Appends an expiring string write.
    pub fn set_ex(&mut self, key: impl Into<String>, value: Vec<u8>, ttl: Duration) -> &mut Self {
        self.ops.push(WriteOp::SetEx {
            key: key.into(),
            value,
            ttl,
        });
        self
    }

    /// Appends a sorted-set upsert.
    pub fn zadd(
        &mut self,
        key: impl Into<String>,
        member: impl Into<String>,
        score: i64,
    ) -> &mut Self {
        self.ops.push(WriteOp::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    /// Returns the queued operations in submission order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Trait for key/value + sorted-set substrates.
///
/// Implementors must be safe to share across tasks; the store never locks
/// around backend calls and relies on each command being applied whole.
pub trait KeyValueBackend: Send + Sync + fmt::Debug {
    /// Short name for logs (`"redis"`, `"memory"`).
    fn name(&self) -> &'static str;

    /// Submits a batch of writes in order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if the batch could not be
    /// submitted.
    fn apply<'a>(&'a self, batch: &'a WriteBatch) -> BackendFuture<'a, ()>;

    /// Fetches several string keys at once.
    ///
    /// The result has one slot per key, in the same order; missing or expired
    /// keys yield `None`.
    fn get_many<'a>(&'a self, keys: &'a [String]) -> BackendFuture<'a, Vec<Option<Vec<u8>>>>;

    /// Removes sorted-set members with score strictly below `threshold`.
    ///
    /// Returns the number of members removed.
    fn zrem_below<'a>(&'a self, key: &'a str, threshold: i64) -> BackendFuture<'a, u64>;

    /// Removes the lowest-score members until at most `keep` remain.
    ///
    /// Equal scores are ordered by member, so the outcome is deterministic.
    /// Returns the number of members removed.
    fn zrem_lowest<'a>(&'a self, key: &'a str, keep: usize) -> BackendFuture<'a, u64>;

    /// Returns up to `limit` members with `min <= score <= max`.
    fn zrange_by_score<'a>(
        &'a self,
        key: &'a str,
        min: i64,
        max: i64,
        limit: usize,
        order: Order,
    ) -> BackendFuture<'a, Vec<String>>;

    /// Returns the number of members in a sorted set.
    fn zcard<'a>(&'a self, key: &'a str) -> BackendFuture<'a, u64>;

    /// Checks that the substrate is reachable.
    fn ping(&self) -> BackendFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_order() {
        let mut batch = WriteBatch::new();
        batch
            .set_ex("alert:a", b"{}".to_vec(), Duration::from_secs(60))
            .zadd("alert:region:lazio", "a", 10);

        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.ops()[0], WriteOp::SetEx { .. }));
        assert!(matches!(batch.ops()[1], WriteOp::ZAdd { score: 10, .. }));
    }

    #[test]
    fn empty_batch() {
        let batch = WriteBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
