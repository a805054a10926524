//! End-to-end tests of the gateway router over the in-memory backend.

use std::sync::Arc;

use allerta_gateway::{GatewayConfig, GatewayServer};
use allerta_store::{AlertStore, MemoryBackend, StoreConfig};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

// ==================== Helper Functions ====================

fn make_app() -> (Arc<MemoryBackend>, Router) {
    make_app_with(GatewayConfig::default())
}

fn make_app_with(config: GatewayConfig) -> (Arc<MemoryBackend>, Router) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(AlertStore::new(backend.clone(), StoreConfig::default()).unwrap());
    let server = GatewayServer::new(config, store).unwrap();
    (backend, server.router())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ==================== Health & Regions ====================

#[tokio::test]
async fn test_health_endpoints() {
    let (_, app) = make_app();

    for uri in ["/health", "/api/health"] {
        let (status, json) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["backend"], "up");
    }
}

#[tokio::test]
async fn test_health_reports_backend_down() {
    let (backend, app) = make_app();
    backend.set_available(false);

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["backend"], "down");
}

#[tokio::test]
async fn test_regions_endpoint() {
    let (_, app) = make_app_with(GatewayConfig::default().with_regions(["lazio", "veneto"]));

    let (status, json) = send(&app, get("/api/regions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["lazio", "veneto"]));
}

// ==================== Ingest ====================

#[tokio::test]
async fn test_ingest_then_query() {
    let (_, app) = make_app();
    let now = Utc::now().timestamp();

    let body = json!({"alerts": [
        {"region": "lazio", "id": "a", "timestamp": now, "kind": "heat", "level": "severe",
         "title": "Caldo intenso", "metrics": {"tmax": 39.5, "note": "n/a"}},
        {"region": "lazio", "id": "b", "timestamp": now - 10, "kind": "uv"},
        {"region": "sicilia", "id": "c", "timestamp": now - 5}
    ]});
    let (status, json) = send(&app, post_json("/receive-alerts", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["stored_count"], 3);
    assert_eq!(json["regions_touched"], 2);
    assert_eq!(json["total_alerts_received"], 3);

    let (status, json) =
        send(&app, get("/api/current-alerts?region=lazio&since=3600&limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = json["active_alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0]["id"], "a");
    assert_eq!(alerts[0]["level"], "severe");
    assert_eq!(alerts[0]["metrics"]["tmax"], 39.5);
    assert!(alerts[0]["metrics"].get("note").is_none());
    assert_eq!(alerts[1]["id"], "b");
    assert_eq!(alerts[1]["title"], "Alert");
}

#[tokio::test]
async fn test_ingest_api_alias_and_bare_array() {
    let (_, app) = make_app();
    let body = json!([{"region": "Emilia Romagna", "kind": "rain"}]);

    let (status, json) = send(&app, post_json("/api/alerts", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored_count"], 1);

    let (_, json) = send(&app, get("/current-alerts?region=emilia-romagna")).await;
    assert_eq!(json["active_alerts"][0]["region"], "emilia-romagna");
}

#[tokio::test]
async fn test_ingest_legacy_shape() {
    let (_, app) = make_app();
    let body = json!({
        "region": "campania",
        "points_with_alerts": [
            {"lat": 40.85, "lon": 14.27, "alerts": ["heat", "uv"]},
            {"lat": 40.68, "lon": 14.76, "alerts": ["heat"]}
        ]
    });

    let (status, json) = send(&app, post_json("/receive-alerts", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored_count"], 3);
    assert_eq!(json["total_alerts_received"], 3);

    // Re-posting the same points converges on the same records.
    send(&app, post_json("/receive-alerts", &body)).await;
    let (_, json) = send(&app, get("/current-alerts?region=campania")).await;
    assert_eq!(json["active_alerts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_ingest_rejects_unknown_shape() {
    let (_, app) = make_app();

    let (status, json) = send(&app, post_json("/receive-alerts", &json!({"foo": "bar"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_request");

    let request = Request::builder()
        .method("POST")
        .uri("/receive-alerts")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_backend_down_is_503() {
    let (backend, app) = make_app();
    backend.set_available(false);

    let body = json!({"alerts": [{"region": "lazio"}]});
    let (status, json) = send(&app, post_json("/receive-alerts", &body)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "backend_unavailable");
}

// ==================== Query ====================

#[tokio::test]
async fn test_query_without_region_is_empty() {
    let (_, app) = make_app();

    for uri in [
        "/current-alerts",
        "/api/current-alerts?region=",
        "/api/current-alerts?region=%20",
    ] {
        let (status, json) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"active_alerts": []}));
    }
}

#[tokio::test]
async fn test_query_unknown_region_is_empty() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/current-alerts?region=sicilia")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active_alerts"], json!([]));
}

#[tokio::test]
async fn test_query_sets_no_store() {
    let (_, app) = make_app();
    let response = app
        .oneshot(get("/api/current-alerts?region=lazio"))
        .await
        .unwrap();
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_query_rejects_malformed_params() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/current-alerts?region=lazio&limit=lots")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_query_backend_down_is_503() {
    let (backend, app) = make_app();
    backend.set_available(false);

    let (status, json) = send(&app, get("/current-alerts?region=lazio")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "backend_unavailable");
}

#[tokio::test]
async fn test_query_respects_limit_cap() {
    let (_, app) = make_app_with(GatewayConfig::default().with_limits(5, 10));
    let now = Utc::now().timestamp();
    let alerts: Vec<Value> = (0..30)
        .map(|i| json!({"region": "marche", "id": format!("m{i}"), "timestamp": now - i}))
        .collect();
    send(&app, post_json("/receive-alerts", &json!({ "alerts": alerts }))).await;

    let (_, json) = send(&app, get("/current-alerts?region=marche")).await;
    assert_eq!(json["active_alerts"].as_array().unwrap().len(), 5);

    let (_, json) = send(&app, get("/current-alerts?region=marche&limit=1000")).await;
    let alerts = json["active_alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 10);
    let stamps: Vec<i64> = alerts.iter().map(|a| a["timestamp"].as_i64().unwrap()).collect();
    assert!(stamps.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn test_query_with_refresh_and_no_producer() {
    let (_, app) = make_app();
    let now = Utc::now().timestamp();
    send(
        &app,
        post_json("/receive-alerts", &json!({"alerts": [{"region": "umbria", "timestamp": now}]})),
    )
    .await;

    let (status, json) = send(&app, get("/current-alerts?region=umbria&refresh=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active_alerts"].as_array().unwrap().len(), 1);
}

// ==================== Fetch Trigger ====================

#[tokio::test]
async fn test_fetch_requires_region() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/fetch?uv=7")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_request");
}

#[tokio::test]
async fn test_fetch_without_producer_is_bad_gateway() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/fetch?region=lazio&uv=7&days=2")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["ok"], false);
    assert_eq!(json["outcome"], "disabled");
}

#[tokio::test]
async fn test_fetch_forwards_to_producer() {
    use axum::extract::Query;
    use axum::routing::get as get_route;
    use std::collections::HashMap;

    let producer = Router::new().route(
        "/weather-alert",
        get_route(|Query(params): Query<HashMap<String, String>>| async move {
            axum::Json(json!({"received": params}))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, producer).await.unwrap();
    });

    let config = GatewayConfig::default().with_producer_url(format!("http://{addr}/weather-alert"));
    let (_, app) = make_app_with(config);

    let (status, json) = send(&app, get("/api/fetch?region=lazio&tmax=36&ws=50")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["fetcher"]["received"]["region"], "lazio");
    assert_eq!(json["fetcher"]["received"]["tmax"], "36");
    assert_eq!(json["fetcher"]["received"]["ws"], "50");
    assert!(json["fetcher"]["received"].get("uv").is_none());
}

#[tokio::test]
async fn test_fetch_rejects_malformed_thresholds() {
    let (_, app) = make_app();
    let (status, _) = send(&app, get("/api/fetch?region=lazio&uv=high")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ==================== Routing ====================

#[tokio::test]
async fn test_unknown_endpoint() {
    let (_, app) = make_app();
    let (status, _) = send(&app, get("/api/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (_, app) = make_app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/current-alerts")
        .header("Origin", "http://dashboard.test")
        .header("Access-Control-Request-Method", "GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
