//! Query gateway: applies request defaults, optionally refreshes, then reads.

use std::sync::Arc;

use allerta_store::{AlertRecord, AlertStore};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::trigger::{ProducerTrigger, Thresholds};
use crate::types::AlertQuery;

/// Entry point for current-alert lookups.
#[derive(Debug, Clone)]
pub struct QueryGateway {
    store: Arc<AlertStore>,
    trigger: Arc<ProducerTrigger>,
    config: Arc<GatewayConfig>,
}

impl QueryGateway {
    /// Creates a query gateway.
    #[must_use]
    pub const fn new(
        store: Arc<AlertStore>,
        trigger: Arc<ProducerTrigger>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            store,
            trigger,
            config,
        }
    }

    /// Answers one query.
    ///
    /// A missing or blank region yields an empty list. With `refresh` set the
    /// producer is asked for fresh data first; its outcome never affects the
    /// read.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GatewayError::Store`] if the backend is unavailable.
    pub async fn query(&self, params: AlertQuery) -> GatewayResult<Vec<AlertRecord>> {
        let Some(region) = params
            .region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        else {
            return Ok(Vec::new());
        };

        if params.refresh {
            let outcome = self.trigger.refresh(region, &Thresholds::default()).await;
            debug!(region = %region, outcome = outcome.label(), "refresh before query");
        }

        let since = params
            .since
            .unwrap_or_else(|| self.config.default_since.as_secs());
        let limit = self.config.effective_limit(params.limit);

        Ok(self.store.query(region, since, limit).await?)
    }
}
