//! Route configuration for the gateway API.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::handlers::{
    current_alerts, health_check, list_regions, receive_alerts, trigger_fetch,
};
use crate::state::GatewayState;

/// Create the gateway router.
///
/// Producers and older dashboards use the root paths; the `/api` tree is
/// what the current dashboard calls.
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/regions", get(list_regions))
        .route("/alerts", post(receive_alerts))
        .route("/current-alerts", get(current_alerts))
        .route("/fetch", get(trigger_fetch));

    Router::new()
        .route("/health", get(health_check))
        .route("/receive-alerts", post(receive_alerts))
        .route("/current-alerts", get(current_alerts))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &GatewayConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
