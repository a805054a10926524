//! The alert store: ingestion and recency queries over region indexes.
//!
//! Write path: normalize → encode → write record with TTL → index entry,
//! then trim every touched region once. Read path: score range on the
//! region index → multi-get → decode, dropping anything missing or corrupt.
//!
//! The store takes no locks. Concurrent ingests into one region may race with
//! each other's trims; the retention and capacity bounds hold eventually, not
//! at every instant.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::backend::{KeyValueBackend, WriteBatch};
use crate::codec;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::index::{IndexKey, RegionIndex};
use crate::normalize::{is_valid_region, normalize, region_slug};
use crate::types::{AlertRecord, IngestSummary, Order, RawAlert};

/// Region-scoped, retention-bounded alert store.
///
/// Owns the backend handle for its whole lifetime; share the store itself
/// behind an `Arc` rather than opening several.
#[derive(Debug, Clone)]
pub struct AlertStore {
    backend: Arc<dyn KeyValueBackend>,
    config: StoreConfig,
}

impl AlertStore {
    /// Creates a store over `backend`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConfig` if `config` fails validation.
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the backend handle.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn KeyValueBackend> {
        Arc::clone(&self.backend)
    }

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if it is not.
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }

    /// Ingests a batch of raw payloads at the current time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` only if no record could be
    /// written at all.
    pub async fn ingest(&self, payloads: Vec<RawAlert>) -> Result<IngestSummary> {
        self.ingest_at(payloads, Utc::now().timestamp()).await
    }

    /// Ingests a batch of raw payloads as of `now` (seconds since epoch).
    ///
    /// Payloads that fail normalization are skipped. When several payloads in
    /// the batch share an identity, the last one wins and is stored once.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` only if no record could be
    /// written at all.
    pub async fn ingest_at(&self, payloads: Vec<RawAlert>, now: i64) -> Result<IngestSummary> {
        let received = payloads.len();
        let mut records: Vec<AlertRecord> = Vec::with_capacity(received);
        let mut position: HashMap<String, usize> = HashMap::new();

        for raw in payloads {
            match normalize(raw, now) {
                Ok(record) => match position.get(&record.id) {
                    Some(&at) => records[at] = record,
                    None => {
                        position.insert(record.id.clone(), records.len());
                        records.push(record);
                    }
                },
                Err(e) => debug!(error = %e, "skipping alert payload"),
            }
        }

        if records.is_empty() {
            debug!(received, "no valid payloads in batch");
            return Ok(IngestSummary::default());
        }

        let batches: Vec<WriteBatch> = records.iter().map(|r| self.record_batch(r)).collect();
        let results = join_all(batches.iter().map(|b| self.backend.apply(b))).await;

        let mut touched = BTreeSet::new();
        let mut stored = 0;
        let mut first_error = None;
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(()) => {
                    stored += 1;
                    touched.insert(record.region.as_str());
                }
                Err(e) => {
                    warn!(
                        id = %record.id,
                        region = %record.region,
                        error = %e,
                        "failed to store alert"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if stored == 0 {
            return Err(first_error.unwrap_or_else(|| StoreError::backend("no records written")));
        }

        let trims = join_all(touched.iter().map(|region| self.trim_region(region, now))).await;
        for (region, result) in touched.iter().zip(trims) {
            if let Err(e) = result {
                warn!(region = %region, error = %e, "failed to trim region index");
            }
        }

        let summary = IngestSummary {
            stored_count: stored,
            regions_touched: touched.len(),
        };
        info!(
            received,
            stored = summary.stored_count,
            regions = summary.regions_touched,
            "ingested alert batch"
        );
        Ok(summary)
    }

    /// Returns the most recent records for `region` at the current time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if the backend cannot be read.
    pub async fn query(
        &self,
        region: &str,
        since_secs: u64,
        limit: usize,
    ) -> Result<Vec<AlertRecord>> {
        self.query_at(region, since_secs, limit, Utc::now().timestamp())
            .await
    }

    /// Returns up to `limit` records for `region` with timestamps in
    /// `[now - min(since, R), now]`, most recent first.
    ///
    /// A blank or unusable region yields an empty list. Records whose bytes
    /// are missing or corrupt are dropped silently, as is a record whose
    /// identity has since been reused by another region.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if the backend cannot be read.
    pub async fn query_at(
        &self,
        region: &str,
        since_secs: u64,
        limit: usize,
        now: i64,
    ) -> Result<Vec<AlertRecord>> {
        let Some(region) = region_slug(region).filter(|r| is_valid_region(r)) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let window = i64::try_from(since_secs)
            .unwrap_or(i64::MAX)
            .min(self.config.retention_secs());
        let min_score = now.saturating_sub(window);

        let key = IndexKey::new(&self.config, &region);
        let ids = RegionIndex::new(self.backend.as_ref(), &key)
            .range_by_score(min_score, now, limit, Order::Descending)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.config.record_key(id)).collect();
        let values = self.backend.get_many(&keys).await?;

        let mut records = Vec::with_capacity(ids.len());
        for (id, value) in ids.iter().zip(values) {
            let Some(bytes) = value else {
                debug!(region = %region, id = %id, "indexed record has expired");
                continue;
            };
            match codec::try_decode(&bytes) {
                Ok(record) if record.region == region => records.push(record),
                Ok(record) => debug!(
                    region = %region,
                    id = %id,
                    owner = %record.region,
                    "identity now belongs to another region"
                ),
                Err(e) => {
                    debug!(region = %region, id = %id, error = %e, "dropping corrupt record");
                }
            }
        }

        debug!(
            region = %region,
            candidates = ids.len(),
            returned = records.len(),
            "answered alert query"
        );
        Ok(records)
    }

    /// Current number of index entries for `region`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if the backend cannot be read.
    pub async fn region_size(&self, region: &str) -> Result<u64> {
        let Some(region) = region_slug(region).filter(|r| is_valid_region(r)) else {
            return Ok(0);
        };
        let key = IndexKey::new(&self.config, &region);
        RegionIndex::new(self.backend.as_ref(), &key).size().await
    }

    /// Record write followed by its index entry, in that order.
    fn record_batch(&self, record: &AlertRecord) -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.set_ex(
            self.config.record_key(&record.id),
            codec::encode(record),
            self.config.retention,
        );
        let key = IndexKey::new(&self.config, &record.region);
        RegionIndex::new(self.backend.as_ref(), &key).stage_add(
            &mut batch,
            &record.id,
            record.timestamp,
        );
        batch
    }

    /// Applies retention, then capacity, to one region.
    async fn trim_region(&self, region: &str, now: i64) -> Result<(u64, u64)> {
        let key = IndexKey::new(&self.config, region);
        let index = RegionIndex::new(self.backend.as_ref(), &key);
        let expired = index
            .remove_below(now.saturating_sub(self.config.retention_secs()))
            .await?;
        let evicted = index
            .remove_oldest_until_size(self.config.max_per_region)
            .await?;
        Ok((expired, evicted))
    }
}
