//! Ingress gateway: accepts producer batches and hands them to the store.

use std::sync::Arc;

use allerta_store::AlertStore;
use tracing::debug;

use crate::error::GatewayResult;
use crate::types::{IngestRequest, IngestResponse};

/// Entry point for producer-pushed alert batches.
#[derive(Debug, Clone)]
pub struct IngressGateway {
    store: Arc<AlertStore>,
}

impl IngressGateway {
    /// Creates an ingress gateway over `store`.
    #[must_use]
    pub const fn new(store: Arc<AlertStore>) -> Self {
        Self { store }
    }

    /// Ingests one request body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GatewayError::Store`] only when the backend rejected
    /// every write.
    pub async fn ingest(&self, request: IngestRequest) -> GatewayResult<IngestResponse> {
        let (payloads, received) = request.into_payloads();
        debug!(received, parsed = payloads.len(), "received alert batch");

        let summary = self.store.ingest(payloads).await?;

        Ok(IngestResponse {
            status: "ok".to_string(),
            stored_count: summary.stored_count,
            regions_touched: summary.regions_touched,
            total_alerts_received: received,
        })
    }
}
