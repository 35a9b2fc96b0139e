//! Integration tests for the HTTP command surface
//!
//! Requests go through the router with `oneshot`, backed by the scripted
//! engine collaborators.

mod helpers;

use axum::body::Body;
use axum::http::StatusCode;
use groupplay_common::events::EventBus;
use groupplay_engine::api::{create_router, AppState};
use helpers::*;
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn setup() -> (axum::Router, Harness) {
    let harness = Harness::new();
    let state = AppState {
        controller: Arc::clone(&harness.controller),
        events: Arc::new(EventBus::new(16)),
        port: 5750,
    };
    (create_router(state), harness)
}

async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);
    let request = match body {
        Some(json_body) => {
            request = request.header("content-type", "application/json");
            request.body(Body::from(json_body.to_string())).unwrap()
        }
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let json_body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, json_body)
}

async fn command(app: &axum::Router, text: &str) -> (StatusCode, Option<Value>) {
    make_request(
        app,
        Method::POST,
        &format!("/api/v1/groups/{}/commands", GROUP),
        Some(json!({ "command": text, "channel": "voice-1", "notify_target": TARGET })),
    )
    .await
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup();

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = body.expect("Expected response body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "groupplay");
    assert_eq!(body["port"], 5750);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_play_then_queue_snapshot() {
    let (app, h) = setup();

    let (status, body) = command(&app, "play a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");
    command(&app, "play b").await;

    let (status, body) = make_request(
        &app,
        Method::GET,
        &format!("/api/v1/groups/{}/queue", GROUP),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = body.unwrap();
    assert_eq!(body["state"], "playing");
    assert_eq!(body["loop_enabled"], false);
    assert_eq!(body["current"]["title"], "Title a");
    assert_eq!(body["pending"][0]["title"], "Title b");
    assert_eq!(body["pending"][0]["index"], 0);
    assert_eq!(h.sink.play_count(), 1);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let (app, h) = setup();
    h.resolver.fail_on("gone");

    let (status, _) = command(&app, "dance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = command(&app, "pause").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.unwrap()["status"], "Not connected");

    let (status, _) = command(&app, "play gone").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = command(&app, "delete 4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Failures were still reported to the group
    assert!(h.notifier.count("Not connected") >= 1);
    assert!(h.notifier.count("Index out of range") >= 1);
}

#[tokio::test]
async fn test_unknown_group_queue_is_not_found() {
    let (app, _) = setup();

    let (status, body) =
        make_request(&app, Method::GET, "/api/v1/groups/nobody/queue", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.unwrap()["status"], "Unknown group: nobody");
}

#[tokio::test]
async fn test_list_groups() {
    let (app, _) = setup();
    command(&app, "join").await;

    let (status, body) = make_request(&app, Method::GET, "/api/v1/groups", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["groups"], json!([GROUP]));
}

#[tokio::test]
async fn test_acknowledge_flag_is_honoured() {
    let (app, h) = setup();

    let (status, _) = make_request(
        &app,
        Method::POST,
        &format!("/api/v1/groups/{}/commands", GROUP),
        Some(json!({ "command": "join", "acknowledge": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.notifier.titles(), vec!["Done"]);
}
