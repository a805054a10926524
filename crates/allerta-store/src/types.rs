//! Core types for the alert store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Region slug used when a payload does not name one.
pub const UNKNOWN_REGION: &str = "unknown";

/// Default alert level.
pub const DEFAULT_LEVEL: &str = "info";

/// Default alert kind.
pub const DEFAULT_KIND: &str = "generic";

/// Default alert title.
pub const DEFAULT_TITLE: &str = "Alert";

/// A normalized alert event.
///
/// Records are immutable once written. Re-ingesting a record with the same
/// `id` replaces the stored value and moves its index entry to the new
/// timestamp.
///
/// Metric values are expected to be finite; [`crate::normalize`] drops
/// anything else before a record is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Stable identity, supplied by the producer or derived.
    pub id: String,
    /// Lower-cased region slug.
    pub region: String,
    /// Seconds since the Unix epoch; the recency score.
    pub timestamp: i64,
    /// Origination date as given by the producer (e.g. forecast day).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Severity level (`info`, `medium`, `high`, ...).
    pub level: String,
    /// Alert kind (`heat`, `rain`, `wind`, ...).
    pub kind: String,
    /// Short human-readable title.
    pub title: String,
    /// Free-text message.
    pub message: String,
    /// Numeric measurements attached to the alert.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl AlertRecord {
    /// Creates a record with default classification and no metrics.
    #[must_use]
    pub fn new(id: impl Into<String>, region: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            timestamp,
            date: None,
            level: DEFAULT_LEVEL.to_string(),
            kind: DEFAULT_KIND.to_string(),
            title: DEFAULT_TITLE.to_string(),
            message: String::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Sets the level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a metric.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// A loosely-typed timestamp as producers send it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Whole seconds since the epoch.
    Seconds(i64),
    /// Fractional seconds since the epoch.
    Fractional(f64),
    /// RFC 3339 text, or decimal seconds as a string.
    Text(String),
}

/// An alert payload as received from a producer.
///
/// Every field is optional; [`crate::normalize::normalize`] turns this into an
/// [`AlertRecord`] with explicit defaults. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAlert {
    /// Producer-assigned identity.
    pub id: Option<String>,
    /// Region name or slug.
    pub region: Option<String>,
    /// Origination date.
    pub date: Option<String>,
    /// Event time.
    pub timestamp: Option<RawTimestamp>,
    /// Severity level.
    pub level: Option<String>,
    /// Alert kind.
    pub kind: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Message.
    pub message: Option<String>,
    /// Arbitrary metrics; non-numeric values are dropped.
    pub metrics: Option<BTreeMap<String, serde_json::Value>>,
    /// Latitude of the observation point.
    pub lat: Option<f64>,
    /// Longitude of the observation point.
    pub lon: Option<f64>,
}

impl RawAlert {
    /// Creates a payload with only a region set.
    #[must_use]
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Self::default()
        }
    }

    /// Sets the identity.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the timestamp in whole seconds.
    #[must_use]
    pub fn with_timestamp(mut self, secs: i64) -> Self {
        self.timestamp = Some(RawTimestamp::Seconds(secs));
        self
    }

    /// Sets the origination date.
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a metric value.
    #[must_use]
    pub fn with_metric(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metrics
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Parses a payload from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Validation`] if the value is not an object
    /// or a field has the wrong type.
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        if !value.is_object() {
            return Err(crate::StoreError::validation("alert payload must be a JSON object"));
        }
        serde_json::from_value(value).map_err(|e| crate::StoreError::validation(e.to_string()))
    }
}

/// Outcome of an ingest call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Number of records written.
    pub stored_count: usize,
    /// Number of distinct regions that received at least one record.
    pub regions_touched: usize,
}

/// Sort order for score range lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// Lowest score first.
    Ascending,
    /// Highest score (most recent) first.
    #[default]
    Descending,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}
