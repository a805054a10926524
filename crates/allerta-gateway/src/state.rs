//! Shared state for the gateway server.

use std::sync::Arc;
use std::time::Instant;

use allerta_store::AlertStore;

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::ingress::IngressGateway;
use crate::query::QueryGateway;
use crate::trigger::ProducerTrigger;

/// Shared state for the gateway server.
#[derive(Debug)]
pub struct GatewayState {
    /// Gateway configuration.
    config: Arc<GatewayConfig>,
    /// Alert store (owns the backend connection).
    store: Arc<AlertStore>,
    /// Producer refresh client.
    trigger: Arc<ProducerTrigger>,
    ingress: IngressGateway,
    query: QueryGateway,
    /// Server start time.
    start_time: Instant,
}

impl GatewayState {
    /// Create a new gateway state.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the producer client cannot
    /// be built.
    pub fn new(config: GatewayConfig, store: Arc<AlertStore>) -> GatewayResult<Self> {
        config.validate()?;
        let trigger = Arc::new(ProducerTrigger::new(
            config.producer_url.clone(),
            config.trigger_timeout,
        )?);
        let config = Arc::new(config);

        Ok(Self {
            ingress: IngressGateway::new(Arc::clone(&store)),
            query: QueryGateway::new(Arc::clone(&store), Arc::clone(&trigger), Arc::clone(&config)),
            config,
            store,
            trigger,
            start_time: Instant::now(),
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get the alert store.
    #[must_use]
    pub fn store(&self) -> Arc<AlertStore> {
        Arc::clone(&self.store)
    }

    /// Get the producer trigger.
    #[must_use]
    pub fn trigger(&self) -> &ProducerTrigger {
        &self.trigger
    }

    /// Get the ingress gateway.
    #[must_use]
    pub const fn ingress(&self) -> &IngressGateway {
        &self.ingress
    }

    /// Get the query gateway.
    #[must_use]
    pub const fn query(&self) -> &QueryGateway {
        &self.query
    }

    /// Get server uptime in seconds.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Returns true if the store backend answers a ping.
    pub async fn backend_up(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
