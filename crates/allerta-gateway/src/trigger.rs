//! Best-effort refresh calls to the alert producer.
//!
//! The producer fetches forecasts for a region and posts any alerts it finds
//! back to the ingest endpoint. Asking it to refresh is advisory: failures are
//! logged and reported, never propagated.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

/// Threshold overrides forwarded to the producer.
///
/// Unset fields are omitted so the producer applies its own defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// UV index.
    pub uv: Option<f64>,
    /// Maximum temperature, °C.
    pub tmax: Option<f64>,
    /// Minimum temperature, °C.
    pub tmin: Option<f64>,
    /// Precipitation probability, %.
    pub pp: Option<f64>,
    /// Rain amount, mm.
    pub pr: Option<f64>,
    /// Snowfall, cm.
    pub sn: Option<f64>,
    /// Wind speed, km/h.
    pub ws: Option<f64>,
    /// Wind gusts, km/h.
    pub wg: Option<f64>,
    /// Forecast horizon in days.
    pub days: Option<u32>,
}

impl Thresholds {
    /// Returns the set parameters as query pairs.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let floats = [
            ("uv", self.uv),
            ("tmax", self.tmax),
            ("tmin", self.tmin),
            ("pp", self.pp),
            ("pr", self.pr),
            ("sn", self.sn),
            ("ws", self.ws),
            ("wg", self.wg),
        ];
        let mut pairs: Vec<_> = floats
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
            .collect();
        if let Some(days) = self.days {
            pairs.push(("days", days.to_string()));
        }
        pairs
    }
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// No producer is configured.
    Disabled,
    /// The producer answered with a success status.
    Refreshed {
        /// Producer response body (`{}` when not JSON).
        body: Value,
    },
    /// The producer answered with an error status.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Producer response body (`{}` when not JSON).
        body: Value,
    },
    /// The producer could not be reached in time.
    Failed {
        /// Transport error description.
        reason: String,
    },
}

impl TriggerOutcome {
    /// Returns true if the producer accepted the refresh.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }

    /// Short label for logs and responses.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Refreshed { .. } => "refreshed",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }
}

/// HTTP client for the producer's refresh endpoint.
#[derive(Debug, Clone)]
pub struct ProducerTrigger {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl ProducerTrigger {
    /// Creates a trigger for `url`, or a disabled one when `url` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
    pub fn new(url: Option<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build http client: {e}")))?;
        if let Some(url) = &url {
            info!(url = %url, timeout_secs = timeout.as_secs(), "producer trigger enabled");
        }
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    /// Creates a trigger that never calls out.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
    pub fn disabled() -> GatewayResult<Self> {
        Self::new(None, Duration::from_secs(1))
    }

    /// Returns true if a producer is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Asks the producer to refresh `region`.
    pub async fn refresh(&self, region: &str, thresholds: &Thresholds) -> TriggerOutcome {
        let Some(url) = &self.url else {
            debug!(region = %region, "producer trigger disabled");
            return TriggerOutcome::Disabled;
        };

        let request = self
            .client
            .get(url)
            .query(&[("region", region)])
            .query(&thresholds.query_pairs());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("timed out after {}s", self.timeout.as_secs())
                } else {
                    e.to_string()
                };
                warn!(region = %region, error = %reason, "producer refresh failed");
                return TriggerOutcome::Failed { reason };
            }
        };

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        if status.is_success() {
            info!(region = %region, status = status.as_u16(), "producer refreshed region");
            TriggerOutcome::Refreshed { body }
        } else {
            warn!(region = %region, status = status.as_u16(), "producer rejected refresh");
            TriggerOutcome::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}
