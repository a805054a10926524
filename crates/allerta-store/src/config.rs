//! Store configuration.

use std::time::Duration;

use crate::error::{Result, StoreError};

/// Default retention window: 24 hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted retention window: ten years.
pub const MAX_RETENTION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Default maximum index entries per region.
pub const DEFAULT_MAX_PER_REGION: usize = 200;

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "alert";

/// Configuration for an [`crate::AlertStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Retention window `R`: record TTL and the index trim horizon.
    pub retention: Duration,
    /// Capacity bound `M`: maximum index entries kept per region.
    pub max_per_region: usize,
    /// Prefix for every key the store writes.
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            max_per_region: DEFAULT_MAX_PER_REGION,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with the given retention and capacity.
    #[must_use]
    pub fn new(retention: Duration, max_per_region: usize) -> Self {
        Self {
            retention,
            max_per_region,
            ..Self::default()
        }
    }

    /// Set the retention window.
    #[must_use]
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the per-region capacity.
    #[must_use]
    pub const fn with_max_per_region(mut self, max: usize) -> Self {
        self.max_per_region = max;
        self
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Retention window in whole seconds.
    #[must_use]
    pub fn retention_secs(&self) -> i64 {
        i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX)
    }

    /// Key holding the encoded record `id`.
    #[must_use]
    pub fn record_key(&self, id: &str) -> String {
        format!("{}:{id}", self.key_prefix)
    }

    /// Key of the sorted set indexing `region`.
    #[must_use]
    pub fn index_key(&self, region: &str) -> String {
        format!("{}:region:{region}", self.key_prefix)
    }

    /// Checks the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if retention is under one second,
    /// capacity is zero, or the prefix is empty.
    pub fn validate(&self) -> Result<()> {
        if self.retention.as_secs() == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "retention must be at least one second".to_string(),
            });
        }
        if self.retention > MAX_RETENTION {
            return Err(StoreError::InvalidConfig {
                reason: format!(
                    "retention of {}s exceeds the {}s maximum",
                    self.retention.as_secs(),
                    MAX_RETENTION.as_secs()
                ),
            });
        }
        if self.max_per_region == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "max entries per region must be positive".to_string(),
            });
        }
        if self.key_prefix.trim().is_empty() {
            return Err(StoreError::InvalidConfig {
                reason: "key prefix cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.retention, Duration::from_secs(86_400));
        assert_eq!(config.max_per_region, 200);
        assert_eq!(config.key_prefix, "alert");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new(Duration::from_secs(3600), 50).with_key_prefix("wx");
        assert_eq!(config.retention_secs(), 3600);
        assert_eq!(config.max_per_region, 50);
        assert_eq!(config.record_key("abc"), "wx:abc");
        assert_eq!(config.index_key("lazio"), "wx:region:lazio");
    }

    #[test]
    fn test_config_validation() {
        assert!(StoreConfig::default().with_retention(Duration::ZERO).validate().is_err());
        assert!(StoreConfig::default().with_max_per_region(0).validate().is_err());
        assert!(StoreConfig::default().with_key_prefix(" ").validate().is_err());
    }

    #[test]
    fn test_retention_is_bounded() {
        assert!(StoreConfig::default().with_retention(MAX_RETENTION).validate().is_ok());

        let huge = StoreConfig::default().with_retention(Duration::from_secs(u64::MAX));
        assert!(matches!(huge.validate(), Err(StoreError::InvalidConfig { .. })));
    }
}
