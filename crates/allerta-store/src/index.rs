//! Per-region recency index.
//!
//! Each region owns one sorted set mapping record identity to its timestamp.
//! The index only holds identities; record bodies live under their own
//! expiring keys and may vanish before a lagging trim catches up.

use tracing::debug;

use crate::backend::{KeyValueBackend, WriteBatch};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::types::Order;

/// Handle to one region's index.
#[derive(Debug, Clone, Copy)]
pub struct RegionIndex<'a> {
    backend: &'a dyn KeyValueBackend,
    key: &'a str,
}

/// Owned index key for a region, from which [`RegionIndex`] handles borrow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    region: String,
    key: String,
}

impl IndexKey {
    /// Builds the key for `region` under the configured prefix.
    #[must_use]
    pub fn new(config: &StoreConfig, region: &str) -> Self {
        Self {
            region: region.to_string(),
            key: config.index_key(region),
        }
    }

    /// The region slug.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The sorted-set key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl<'a> RegionIndex<'a> {
    /// Opens the index stored under `key`.
    #[must_use]
    pub fn new(backend: &'a dyn KeyValueBackend, key: &'a IndexKey) -> Self {
        Self {
            backend,
            key: key.as_str(),
        }
    }

    /// Upserts `id` with `score`, moving it if already present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` on substrate failure.
    pub async fn add(&self, id: &str, score: i64) -> Result<()> {
        let mut batch = WriteBatch::new();
        self.stage_add(&mut batch, id, score);
        self.backend.apply(&batch).await
    }

    /// Queues the upsert of `id` onto `batch` instead of applying it.
    pub fn stage_add(&self, batch: &mut WriteBatch, id: &str, score: i64) {
        batch.zadd(self.key, id, score);
    }

    /// Removes every entry with score strictly below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` on substrate failure.
    pub async fn remove_below(&self, threshold: i64) -> Result<u64> {
        let removed = self.backend.zrem_below(self.key, threshold).await?;
        if removed > 0 {
            debug!(index = self.key, threshold, removed, "trimmed expired entries");
        }
        Ok(removed)
    }

    /// Evicts the oldest entries until at most `max_size` remain.
    ///
    /// Among equal scores the lexicographically smaller identity goes first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` on substrate failure.
    pub async fn remove_oldest_until_size(&self, max_size: usize) -> Result<u64> {
        let removed = self.backend.zrem_lowest(self.key, max_size).await?;
        if removed > 0 {
            debug!(index = self.key, max_size, removed, "evicted oldest entries");
        }
        Ok(removed)
    }

    /// Returns up to `limit` identities scored within `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` on substrate failure.
    pub async fn range_by_score(
        &self,
        min: i64,
        max: i64,
        limit: usize,
        order: Order,
    ) -> Result<Vec<String>> {
        self.backend
            .zrange_by_score(self.key, min, max, limit, order)
            .await
    }

    /// Current number of entries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` on substrate failure.
    pub async fn size(&self) -> Result<u64> {
        self.backend.zcard(self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn key(region: &str) -> IndexKey {
        IndexKey::new(&StoreConfig::default(), region)
    }

    #[test]
    fn index_key_layout() {
        let key = key("lazio");
        assert_eq!(key.region(), "lazio");
        assert_eq!(key.as_str(), "alert:region:lazio");
    }

    #[tokio::test]
    async fn add_is_an_upsert() {
        let backend = MemoryBackend::new();
        let key = key("lazio");
        let index = RegionIndex::new(&backend, &key);

        index.add("a", 100).await.unwrap();
        index.add("a", 200).await.unwrap();

        assert_eq!(index.size().await.unwrap(), 1);
        assert_eq!(backend.score_of("alert:region:lazio", "a"), Some(200));
    }

    #[tokio::test]
    async fn range_is_most_recent_first() {
        let backend = MemoryBackend::new();
        let key = key("lazio");
        let index = RegionIndex::new(&backend, &key);
        for (id, score) in [("a", 10), ("b", 30), ("c", 20)] {
            index.add(id, score).await.unwrap();
        }

        let ids = index.range_by_score(0, 100, 10, Order::Descending).await.unwrap();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let ids = index.range_by_score(15, 100, 1, Order::Descending).await.unwrap();
        assert_eq!(ids, vec!["b"]);

        let ids = index.range_by_score(0, 25, 10, Order::Ascending).await.unwrap();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn remove_below_then_cap() {
        let backend = MemoryBackend::new();
        let key = key("veneto");
        let index = RegionIndex::new(&backend, &key);
        for score in 0..10 {
            index.add(&format!("id{score}"), score).await.unwrap();
        }

        assert_eq!(index.remove_below(3).await.unwrap(), 3);
        assert_eq!(index.size().await.unwrap(), 7);

        assert_eq!(index.remove_oldest_until_size(4).await.unwrap(), 3);
        let ids = index.range_by_score(0, 100, 10, Order::Ascending).await.unwrap();
        assert_eq!(ids, vec!["id6", "id7", "id8", "id9"]);
    }

    #[tokio::test]
    async fn regions_are_isolated() {
        let backend = MemoryBackend::new();
        let lazio = key("lazio");
        let sicilia = key("sicilia");
        RegionIndex::new(&backend, &lazio).add("a", 1).await.unwrap();

        assert_eq!(RegionIndex::new(&backend, &sicilia).size().await.unwrap(), 0);
    }
}
