//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Each test spawns a real simulator service that
//! publishes into the observer's feed.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use moka_core::model::BrewModel;
use moka_core::publish::StatePublisher;
use moka_core::service::spawn_simulator;
use moka_observer::router::build_router;
use moka_observer::state::{AppState, StateFeed};
use serde_json::Value;
use tower::ServiceExt;

fn make_state() -> Arc<AppState> {
    let feed = Arc::new(StateFeed::new());
    let (simulator, _task) = spawn_simulator(
        BrewModel::default(),
        Arc::clone(&feed) as Arc<dyn StatePublisher>,
    );
    Arc::new(AppState::new(feed, simulator))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(state: &Arc<AppState>, method: &str, path: &str) -> axum::response::Response {
    build_router(Arc::clone(state))
        .oneshot(
            Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn index_returns_html() {
    let state = make_state();
    let response = call(&state, "GET", "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Moka Observer"));
    assert!(html.contains("/api/start"));
}

#[tokio::test]
async fn state_starts_idle() {
    let state = make_state();
    let response = call(&state, "GET", "/api/state").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["snapshot"]["phase"], "idle");
    assert_eq!(json["snapshot"]["temperature"], 20.0);
    assert_eq!(json["connected"], false);
}

#[tokio::test]
async fn post_start_begins_heating() {
    let state = make_state();
    let response = call(&state, "POST", "/api/start").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "started");
    assert_eq!(json["snapshot"]["phase"], "heating");
    assert_eq!(json["snapshot"]["temperature"], 20.0);
    assert_eq!(json["snapshot"]["coffee_volume"], 0.0);

    let latest = state.feed.latest().unwrap();
    assert_eq!(latest.snapshot.phase, moka_types::Phase::Heating);
}

#[tokio::test]
async fn get_routes_control_the_brew() {
    let state = make_state();

    let json = body_json(call(&state, "GET", "/api/start").await).await;
    assert_eq!(json["status"], "started");

    let json = body_json(call(&state, "GET", "/api/stop").await).await;
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["snapshot"]["phase"], "idle");

    let json = body_json(call(&state, "GET", "/api/reset").await).await;
    assert_eq!(json["status"], "reset");
    assert_eq!(json["snapshot"]["phase"], "idle");
}

#[tokio::test]
async fn state_reflects_last_command_and_connectivity() {
    let state = make_state();
    call(&state, "POST", "/api/start").await;
    state.connected.store(true, Ordering::Relaxed);

    let json = body_json(call(&state, "GET", "/api/state").await).await;
    assert_eq!(json["snapshot"]["phase"], "heating");
    assert_eq!(json["connected"], true);
    assert!(json["updated_at"].is_string());
}

#[tokio::test]
async fn control_after_shutdown_is_service_unavailable() {
    let state = make_state();
    state.simulator.shutdown().await.unwrap();
    while !state.simulator.is_closed() {
        tokio::task::yield_now().await;
    }

    let response = call(&state, "POST", "/api/start").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert_eq!(json["status"], 503);
    assert!(json["error"].as_str().unwrap().contains("shut down"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let state = make_state();
    let response = call(&state, "GET", "/api/brew").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_on_control_route_is_rejected() {
    let state = make_state();
    let response = call(&state, "DELETE", "/api/start").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
