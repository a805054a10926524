//! # allerta-gateway
//!
//! HTTP front end for the Allerta alert store.
//!
//! Producers push batches of weather alerts; dashboards read the most recent
//! alerts per region and can ask the producer to refresh a region on demand.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allerta_gateway::{GatewayConfig, GatewayServer};
//! use allerta_store::{AlertStore, MemoryBackend, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = AlertStore::new(Arc::new(MemoryBackend::new()), StoreConfig::default())?;
//!     let server = GatewayServer::new(GatewayConfig::default(), Arc::new(store))?;
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/receive-alerts`, `/api/alerts` | POST | Ingest a batch of alerts |
//! | `/current-alerts`, `/api/current-alerts` | GET | Recent alerts for `region` |
//! | `/api/fetch` | GET | Ask the producer to refresh `region` |
//! | `/api/regions` | GET | Known region slugs |
//! | `/health`, `/api/health` | GET | Liveness plus backend reachability |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingress;
pub mod query;
pub mod routes;
pub mod server;
pub mod state;
pub mod trigger;
pub mod types;

// Re-export main types
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use ingress::IngressGateway;
pub use query::QueryGateway;
pub use server::GatewayServer;
pub use state::GatewayState;
pub use trigger::{ProducerTrigger, Thresholds, TriggerOutcome};
pub use types::{AlertQuery, AlertsResponse, IngestRequest, IngestResponse};
