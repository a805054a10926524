//! allertad - Allerta alert gateway.
//!
//! Accepts weather alert batches from producers and serves the most recent
//! alerts per region to dashboards.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use allerta_gateway::{GatewayConfig, GatewayServer};
use allerta_store::{AlertStore, KeyValueBackend, MemoryBackend, RedisBackend, StoreConfig};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "allertad=info,allerta_store=info,allerta_gateway=info";

#[derive(Parser, Debug)]
#[command(name = "allertad")]
#[command(about = "Allerta alert gateway")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "ALLERTA_BIND", default_value = "0.0.0.0:5001")]
    bind: SocketAddr,

    /// Redis connection URL (overrides host and port)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    redis_port: u16,

    /// Keep everything in process memory instead of Redis
    #[arg(long)]
    memory: bool,

    /// Seconds a record is retained
    #[arg(long, env = "ALLERTA_RETENTION_SECS", default_value_t = 86_400)]
    retention_secs: u64,

    /// Maximum records indexed per region
    #[arg(long, env = "ALLERTA_MAX_PER_REGION", default_value_t = 200)]
    max_per_region: usize,

    /// Prefix for every stored key
    #[arg(long, env = "ALLERTA_KEY_PREFIX", default_value = "alert")]
    key_prefix: String,

    /// Query window used when the caller gives none, in seconds
    #[arg(long, env = "ALLERTA_DEFAULT_SINCE_SECS", default_value_t = 21_600)]
    default_since_secs: u64,

    /// Records returned when the caller gives no limit
    #[arg(long, env = "ALLERTA_DEFAULT_LIMIT", default_value_t = 100)]
    default_limit: usize,

    /// Upper bound on records returned by one query
    #[arg(long, env = "ALLERTA_MAX_LIMIT", default_value_t = 500)]
    max_limit: usize,

    /// Producer refresh endpoint
    #[arg(long, env = "WEATHER_FETCHER_URL")]
    producer_url: Option<String>,

    /// Timeout for producer refresh calls, in seconds
    #[arg(long, env = "ALLERTA_TRIGGER_TIMEOUT_SECS", default_value_t = 15)]
    trigger_timeout_secs: u64,

    /// Timeout for connecting to the backend, in seconds
    #[arg(long, env = "ALLERTA_BACKEND_TIMEOUT_SECS", default_value_t = 5)]
    backend_timeout_secs: u64,

    /// Allowed CORS origins, comma separated (default: any)
    #[arg(long, env = "ALLERTA_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "ALLERTA_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn redis_url(&self) -> String {
        self.redis_url
            .clone()
            .unwrap_or_else(|| format!("redis://{}:{}", self.redis_host, self.redis_port))
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig::new(Duration::from_secs(self.retention_secs), self.max_per_region)
            .with_key_prefix(self.key_prefix.clone())
    }

    fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::new(self.bind)
            .with_default_since(Duration::from_secs(self.default_since_secs))
            .with_limits(self.default_limit, self.max_limit)
            .with_trigger_timeout(Duration::from_secs(self.trigger_timeout_secs));
        if let Some(url) = &self.producer_url {
            config = config.with_producer_url(url.clone());
        }
        for origin in self.cors_origins.iter().filter(|o| !o.trim().is_empty()) {
            config = config.with_cors_origin(origin.trim());
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let store_config = cli.store_config();
    let gateway_config = cli.gateway_config();

    let redis = if cli.memory {
        None
    } else {
        let timeout = Duration::from_secs(cli.backend_timeout_secs);
        Some(RedisBackend::connect(&cli.redis_url(), timeout).await?)
    };
    let backend: Arc<dyn KeyValueBackend> = match &redis {
        Some(redis) => Arc::new(redis.clone()),
        None => {
            warn!("using in-memory backend; alerts are lost on restart");
            Arc::new(MemoryBackend::new())
        }
    };

    info!(
        backend = backend.name(),
        retention_secs = store_config.retention.as_secs(),
        max_per_region = store_config.max_per_region,
        bind = %gateway_config.bind_addr,
        "starting allertad"
    );

    let store = Arc::new(AlertStore::new(backend, store_config)?);
    let server = GatewayServer::new(gateway_config, store)?;

    let result = server.serve_with_shutdown(shutdown_signal()).await;
    drop(server);
    if let Some(redis) = redis {
        redis.close();
    }
    result?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
