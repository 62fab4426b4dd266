use super::*;
use crate::metrics::ServiceMetrics;
use crate::state::AppState;
use arc_swap::ArcSwap;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::middleware;
use sidecar_core::config::SidecarConfig;
use sidecar_queue::BoundedQueue;
use sidecar_resources::ProfilingFlag;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state(config: SidecarConfig) -> AppState {
    AppState::new(
        Arc::new(ArcSwap::from_pointee(config.clone())),
        Arc::new(BoundedQueue::new(config.queue.max_size)),
        Arc::new(ServiceMetrics::new().unwrap()),
        ProfilingFlag::new(true),
    )
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_route_returns_200_when_nothing_is_wrong() {
    let app = create_router(test_state(SidecarConfig::default()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn ready_route_returns_200_when_enabled_and_under_capacity() {
    let app = create_router(test_state(SidecarConfig::default()));

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_route_returns_prometheus_text() {
    let app = create_router(test_state(SidecarConfig::default()));

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("sidecar_events_queued"));
}

#[tokio::test]
async fn events_route_accepts_a_valid_envelope() {
    let mut config = SidecarConfig::default();
    config.sampling.rates.events = 1.0;
    let app = create_router(test_state(config));

    let body = serde_json::json!({
        "event_type": "test_end",
        "framework": "pytest",
        "run_id": "R1",
        "test_id": "pytest::a.py::t1",
        "data": {"test_name": "t1", "status": "PASS", "elapsed_time": 1.2}
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["queued"], true);
}

#[tokio::test]
async fn events_route_rejects_unknown_event_type_with_400() {
    let app = create_router(test_state(SidecarConfig::default()));

    let body = serde_json::json!({
        "event_type": "not_a_real_type",
        "framework": "pytest",
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_timeout_middleware_returns_408_when_handler_outruns_budget() {
    let mut config = SidecarConfig::default();
    config.http.request_timeout_ms = 20;
    let state = test_state(config);

    let slow_route = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                StatusCode::OK
            }),
        )
        .layer(middleware::from_fn_with_state(state.clone(), enforce_request_timeout))
        .with_state(state);

    let response = slow_route
        .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn reload_route_hot_swaps_sampling_rate_and_reports_updated_fields() {
    let app = create_router(test_state(SidecarConfig::default()));

    let patch = serde_json::json!({"sampling": {"rates": {"events": 0.5}}});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sidecar/config/reload")
                .header("content-type", "application/json")
                .body(Body::from(patch.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["updated_fields"], serde_json::json!(["sampling.rates.events"]));
    assert_eq!(body["restart_required"], serde_json::json!([]));
}

#[tokio::test]
async fn reload_route_reports_restart_required_for_queue_max_size() {
    let app = create_router(test_state(SidecarConfig::default()));

    let patch = serde_json::json!({"queue": {"max_size": 10000}});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sidecar/config/reload")
                .header("content-type", "application/json")
                .body(Body::from(patch.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["restart_required"], serde_json::json!(["queue.max_size"]));
}

#[tokio::test]
async fn reload_route_rejects_invalid_patch_with_400() {
    let app = create_router(test_state(SidecarConfig::default()));

    let patch = serde_json::json!({"sampling": {"rates": {"events": 2.0}}});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sidecar/config/reload")
                .header("content-type", "application/json")
                .body(Body::from(patch.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
