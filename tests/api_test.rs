//! HTTP surface: routing, payload decoding, status mapping, and the
//! JSON envelopes, exercised through the router without a socket.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use logwarden::ai::Summarizer;
use logwarden::api::{router, AppState};
use logwarden::domain::models::Config;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> Router {
    // The store inside the dispatcher keeps the pool (and with it the
    // in-memory database) alive.
    let (_db, _store, _clock, dispatcher) = common::setup_dispatcher().await;
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        summarizer: Arc::new(Summarizer::new(Arc::new(Config::default()))),
    };
    router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["service"], json!("logwarden"));
}

#[tokio::test]
async fn full_task_lifecycle_over_http() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/control/agents",
        Some(json!({"agentKey": "a1", "hostname": "w1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], json!(true));
    let agent_id = body["agent"]["id"].as_str().unwrap().to_string();

    // Re-registration is idempotent.
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/control/agents",
        Some(json!({"agentKey": "a1"})),
    )
    .await;
    assert_eq!(body["created"], json!(false));
    assert_eq!(body["agent"]["id"].as_str().unwrap(), agent_id);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/control/tasks",
        Some(json!({"type": "manual_upload", "target": "D:/logs/x.log"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["task"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["task"]["status"], json!("pending"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/control/dispatch/pull",
        Some(json!({"agentId": agent_id, "maxTasks": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["status"], json!("assigned"));
    assert_eq!(body["items"][0]["assignedAgentId"].as_str().unwrap(), agent_id);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/control/tasks/{task_id}/ack"),
        Some(json!({"agentId": agent_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], json!("running"));

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/control/tasks/{task_id}/complete"),
        Some(json!({"agentId": agent_id, "status": "success"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], json!("success"));
    assert!(body["task"]["finishedAt"].is_string());

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/control/tasks/{task_id}/events"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["eventType"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["succeeded", "started", "assigned"]);
}

#[tokio::test]
async fn conflict_and_not_found_status_codes() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/control/tasks/tsk-000404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/control/agents/agt-000404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Draining agent pulling is a conflict.
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/control/agents",
        Some(json!({"agentKey": "a1"})),
    )
    .await;
    let agent_id = body["agent"]["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/control/agents/{agent_id}/drain"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/control/dispatch/pull",
        Some(json!({"agentId": agent_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Cancel then cancel again: second one conflicts.
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/control/tasks",
        Some(json!({"type": "t", "target": "/x"})),
    )
    .await;
    let task_id = body["task"]["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/control/tasks/{task_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/control/tasks/{task_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn validation_errors_return_bad_request() {
    let app = test_app().await;

    // Missing required fields.
    let (status, _) = send(&app, Method::POST, "/api/control/tasks", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/control/agents", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown status filter value.
    let (status, _) = send(&app, Method::GET, "/api/control/tasks?status=exploded", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Audit range with from after to.
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/control/audit?from=2026-05-02T00:00&to=2026-05-01T00:00",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("from"));

    // AI disabled in the default config.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/ai/log-summary",
        Some(json!({"path": "/var/log/app.log"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failure_reasons_route_is_not_shadowed_by_task_id() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/control/tasks/failure-reasons?limit=5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(0));
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn audit_endpoint_accepts_both_time_formats() {
    let app = test_app().await;

    // Trigger one audited action.
    send(
        &app,
        Method::POST,
        "/api/control/tasks",
        Some(json!({"type": "t", "target": "/x"})),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/control/audit?action=task_create&from=2000-01-01T00:00:00Z&to=2100-01-01T00:00",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["operator"], json!("console"));
}

#[tokio::test]
async fn method_not_allowed_on_wrong_verb() {
    let app = test_app().await;
    let (status, _) = send(&app, Method::DELETE, "/api/control/tasks", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
