//! HTTP request handlers for the gateway API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;
use crate::trigger::{Thresholds, TriggerOutcome};
use crate::types::{
    AlertQuery, AlertsResponse, FetchResponse, HealthResponse, IngestRequest, IngestResponse,
    RegionParam,
};

/// Handle GET /health - health check endpoint.
pub async fn health_check(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    let backend = if state.backend_up().await { "up" } else { "down" };
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
        backend: backend.to_string(),
        checked_at: Utc::now(),
    })
}

/// Handle GET /api/regions - known region slugs.
pub async fn list_regions(State(state): State<Arc<GatewayState>>) -> Json<Vec<String>> {
    Json(state.config().regions.clone())
}

/// Handle POST /receive-alerts - ingest a producer batch.
///
/// The body is parsed here rather than by an extractor so that every shape
/// error comes back as the JSON error body.
pub async fn receive_alerts(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> GatewayResult<Json<IngestResponse>> {
    let request: IngestRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "rejected ingest body");
        GatewayError::InvalidRequest(format!("unrecognised alert payload: {e}"))
    })?;

    let response = state.ingress().ingest(request).await?;
    Ok(Json(response))
}

/// Handle GET /current-alerts - most recent alerts for a region.
pub async fn current_alerts(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<AlertQuery>, QueryRejection>,
) -> GatewayResult<Response> {
    let Query(params) = query.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;

    let active_alerts = state.query().query(params).await?;

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(AlertsResponse { active_alerts }),
    )
        .into_response())
}

/// Handle GET /api/fetch - ask the producer to refresh a region.
pub async fn trigger_fetch(
    State(state): State<Arc<GatewayState>>,
    Query(region): Query<RegionParam>,
    thresholds: Result<Query<Thresholds>, QueryRejection>,
) -> GatewayResult<Response> {
    let region = region
        .region
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| GatewayError::InvalidRequest("missing region".to_string()))?
        .to_string();
    let Query(thresholds) = thresholds.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;

    let outcome = state.trigger().refresh(&region, &thresholds).await;
    let status = if outcome.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    let label = outcome.label().to_string();
    let response = match outcome {
        TriggerOutcome::Disabled => FetchResponse {
            ok: false,
            outcome: label,
            fetcher: None,
            error: Some("no producer configured".to_string()),
        },
        TriggerOutcome::Refreshed { body } | TriggerOutcome::Rejected { body, .. } => {
            FetchResponse {
                ok: status == StatusCode::OK,
                outcome: label,
                fetcher: Some(body),
                error: None,
            }
        }
        TriggerOutcome::Failed { reason } => FetchResponse {
            ok: false,
            outcome: label,
            fetcher: None,
            error: Some(reason),
        },
    };

    Ok((status, Json(response)).into_response())
}
