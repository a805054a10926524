//! Gateway configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Default bind address, the port producers already post to.
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 5001);

/// Default query window: 6 hours.
pub const DEFAULT_SINCE: Duration = Duration::from_secs(6 * 60 * 60);

/// Default number of records returned by a query.
pub const DEFAULT_LIMIT: usize = 100;

/// Hard cap on records returned by a query.
pub const DEFAULT_MAX_LIMIT: usize = 500;

/// Default timeout for producer refresh calls.
pub const DEFAULT_TRIGGER_TIMEOUT: Duration = Duration::from_secs(15);

/// Region slugs the producer knows how to fetch.
pub const DEFAULT_REGIONS: [&str; 20] = [
    "piemonte",
    "valledaosta",
    "liguria",
    "lombardia",
    "trentino-altoadige",
    "veneto",
    "friuli-venezia-giulia",
    "emilia-romagna",
    "toscana",
    "umbria",
    "marche",
    "lazio",
    "abruzzo",
    "molise",
    "campania",
    "puglia",
    "basilicata",
    "calabria",
    "sicilia",
    "sardegna",
];

/// Configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Query window used when the caller gives none.
    pub default_since: Duration,
    /// Result count used when the caller gives none.
    pub default_limit: usize,
    /// Upper bound on the result count.
    pub max_limit: usize,
    /// Producer refresh endpoint; `None` disables the trigger.
    pub producer_url: Option<String>,
    /// Timeout for one producer refresh call.
    pub trigger_timeout: Duration,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
    /// Region slugs advertised by `/api/regions`.
    pub regions: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            default_since: DEFAULT_SINCE,
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            producer_url: None,
            trigger_timeout: DEFAULT_TRIGGER_TIMEOUT,
            cors_origins: Vec::new(),
            regions: DEFAULT_REGIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the default query window.
    #[must_use]
    pub const fn with_default_since(mut self, since: Duration) -> Self {
        self.default_since = since;
        self
    }

    /// Set the default and maximum result counts.
    #[must_use]
    pub const fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    /// Set the producer refresh endpoint.
    #[must_use]
    pub fn with_producer_url(mut self, url: impl Into<String>) -> Self {
        self.producer_url = Some(url.into());
        self
    }

    /// Set the producer refresh timeout.
    #[must_use]
    pub const fn with_trigger_timeout(mut self, timeout: Duration) -> Self {
        self.trigger_timeout = timeout;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Replace the advertised region list.
    #[must_use]
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Clamps a requested result count into `1..=max_limit`.
    #[must_use]
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the limits are inconsistent or the
    /// producer URL is blank.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.max_limit == 0 {
            return Err(GatewayError::Config("max limit must be positive".to_string()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(GatewayError::Config(format!(
                "default limit {} must be within 1..={}",
                self.default_limit, self.max_limit
            )));
        }
        if self
            .producer_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(GatewayError::Config("producer url cannot be blank".to_string()));
        }
        Ok(())
    }
}
