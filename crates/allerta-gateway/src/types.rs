//! Wire types for the gateway API.

use allerta_store::normalize::{derive_id, region_slug};
use allerta_store::{AlertRecord, RawAlert};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Body accepted by the ingest endpoints.
///
/// Variants are tried in declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngestRequest {
    /// `{"alerts": [...]}`, the shape current producers post.
    Batch {
        /// Raw alert payloads.
        alerts: Vec<Value>,
    },
    /// A bare JSON array of payloads.
    Bare(Vec<Value>),
    /// `{"region": ..., "points_with_alerts": [...]}` from older producers.
    Legacy {
        /// Region shared by every point.
        region: String,
        /// Observation points with the alert kinds raised at each.
        points_with_alerts: Vec<LegacyPoint>,
    },
}

/// One observation point in a legacy ingest body.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyPoint {
    /// Latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Alert kinds raised at this point.
    #[serde(default)]
    pub alerts: Vec<String>,
}

impl IngestRequest {
    /// Flattens the body into raw payloads.
    ///
    /// Returns the payloads that parsed, plus the number of items the body
    /// carried in total. Items that are not JSON objects are dropped here.
    #[must_use]
    pub fn into_payloads(self) -> (Vec<RawAlert>, usize) {
        match self {
            Self::Batch { alerts } | Self::Bare(alerts) => {
                let received = alerts.len();
                let payloads = alerts
                    .into_iter()
                    .filter_map(|value| match RawAlert::from_value(value) {
                        Ok(raw) => Some(raw),
                        Err(e) => {
                            debug!(error = %e, "skipping malformed alert item");
                            None
                        }
                    })
                    .collect();
                (payloads, received)
            }
            Self::Legacy {
                region,
                points_with_alerts,
            } => {
                let payloads: Vec<RawAlert> = points_with_alerts
                    .iter()
                    .flat_map(|point| {
                        point
                            .alerts
                            .iter()
                            .map(|kind| legacy_payload(&region, point, kind))
                    })
                    .collect();
                let received = payloads.len();
                (payloads, received)
            }
        }
    }
}

/// One point/kind pair keeps one identity across re-posts.
fn legacy_payload(region: &str, point: &LegacyPoint, kind: &str) -> RawAlert {
    let coords = match (point.lat, point.lon) {
        (Some(lat), Some(lon)) => format!("{lat},{lon}"),
        _ => String::from("-"),
    };
    let slug = region_slug(region).unwrap_or_default();
    let id = derive_id(&slug, &coords, kind);
    RawAlert {
        lat: point.lat,
        lon: point.lon,
        ..RawAlert::for_region(region)
            .with_id(id)
            .with_kind(kind)
            .with_title(kind)
    }
}

/// Response to an ingest call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Records written.
    pub stored_count: usize,
    /// Distinct regions written to.
    pub regions_touched: usize,
    /// Items carried by the request, valid or not.
    pub total_alerts_received: usize,
}

/// Query parameters for the current-alerts endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    /// Region slug or name.
    pub region: Option<String>,
    /// Window in seconds.
    pub since: Option<u64>,
    /// Maximum number of records.
    pub limit: Option<usize>,
    /// Ask the producer for fresh data before reading.
    #[serde(default)]
    pub refresh: bool,
}

/// Response of the current-alerts endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    /// Records, most recent first.
    pub active_alerts: Vec<AlertRecord>,
}

/// Region parameter of the fetch endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionParam {
    /// Region slug.
    pub region: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// `"up"` or `"down"`.
    pub backend: String,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

/// Response of the fetch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Whether the producer accepted the refresh.
    pub ok: bool,
    /// Outcome label.
    pub outcome: String,
    /// Body returned by the producer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetcher: Option<Value>,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
