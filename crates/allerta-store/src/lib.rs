//! # allerta-store
//!
//! Region-scoped, retention-bounded alert storage.
//!
//! This crate provides:
//!
//! - [`AlertStore`]: ingestion and most-recent-first queries per region
//! - [`RegionIndex`]: the per-region recency index
//! - [`KeyValueBackend`]: the substrate seam, with [`RedisBackend`] and
//!   [`MemoryBackend`] implementations
//! - [`codec`]: record encoding
//! - [`normalize`]: raw payload normalization and identity derivation
//!
//! Records live under `{prefix}:{id}` with a TTL equal to the retention
//! window. Each region's index is a sorted set under
//! `{prefix}:region:{region}` scored by record timestamp. After every ingest
//! the touched indexes are trimmed to the retention window, then to the
//! per-region capacity.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allerta_store::{AlertStore, MemoryBackend, RawAlert, StoreConfig};
//!
//! # async fn example() -> allerta_store::Result<()> {
//! let store = AlertStore::new(Arc::new(MemoryBackend::new()), StoreConfig::default())?;
//!
//! store
//!     .ingest(vec![RawAlert::for_region("lazio").with_kind("heat")])
//!     .await?;
//!
//! let recent = store.query("lazio", 6 * 3600, 20).await?;
//! assert_eq!(recent.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod normalize;
pub mod store;
pub mod types;

// Re-export main types
pub use backend::{KeyValueBackend, MemoryBackend, RedisBackend, WriteBatch, WriteOp};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use index::{IndexKey, RegionIndex};
pub use store::AlertStore;
pub use types::{AlertRecord, IngestSummary, Order, RawAlert, RawTimestamp};
