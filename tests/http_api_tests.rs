mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use graphrun::orchestrator::Orchestrator;
use graphrun::server::{router, AppState};
use graphrun::store::ThreadStore;

fn app() -> (Router, Arc<ThreadStore>) {
    let store = Arc::new(ThreadStore::new());
    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::new(ScriptedEngine::new()));
    (router(AppState::new(orchestrator)), store)
}

async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .expect("request build should succeed"),
    )
    .await
    .expect("app should handle request")
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .expect("request build should succeed"),
        )
        .await
        .expect("app should handle request");
    let status = resp.status();
    (status, serde_json::from_str(&body_string(resp).await).unwrap())
}

async fn stream_run(app: Router, thread_id: &str, payload: Value) -> (axum::response::Response, Vec<SseEvent>) {
    let resp = post_raw(app, &format!("/threads/{thread_id}/runs/stream"), payload.to_string()).await;
    let headers = resp.headers().clone();
    let status = resp.status();
    let body = body_string(resp).await;
    let mut head = axum::response::Response::new(Body::empty());
    *head.status_mut() = status;
    *head.headers_mut() = headers;
    (head, parse_sse(&body))
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _) = app();
    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_thread_returns_full_thread_object() {
    let (app, store) = app();
    let resp = post_raw(
        app,
        "/threads",
        json!({"thread_id": "t-1", "metadata": {"owner": "me"}}).to_string(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let thread: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(thread["thread_id"], json!("t-1"));
    assert_eq!(thread["metadata"], json!({"owner": "me"}));
    assert_eq!(thread["status"], json!("idle"));
    assert_eq!(thread["values"], json!({}));
    assert_eq!(thread["interrupts"], json!({}));
    assert!(thread["created_at"].is_string());
    assert_eq!(thread["created_at"], thread["updated_at"]);
    assert!(store.get_thread("t-1").is_some());
}

#[tokio::test]
async fn unparseable_create_body_is_treated_as_empty() {
    let (app, store) = app();
    let resp = post_raw(app, "/threads", "{not json").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let thread: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    let id = thread["thread_id"].as_str().unwrap();
    assert_eq!(id.len(), 36);
    assert_eq!(thread["metadata"], json!({}));
    assert!(store.get_thread(id).is_some());
}

#[tokio::test]
async fn empty_create_body_generates_id() {
    let (app, _) = app();
    let resp = post_raw(app, "/threads", Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let thread: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert!(thread["thread_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn unknown_thread_state_is_empty_shaped() {
    let (app, store) = app();
    let (status, state) = get_json(app, "/threads/nope/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        state,
        json!({
            "values": {},
            "next": [],
            "tasks": [],
            "metadata": {},
            "created_at": null,
            "checkpoint": {},
            "parent_checkpoint": null,
        })
    );
    assert!(store.get_thread("nope").is_none());
}

#[tokio::test]
async fn known_thread_state_carries_checkpoint() {
    let (app, store) = app();
    store.create_thread(Some("t".into()), None);
    let (status, state) = get_json(app, "/threads/t/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["values"], json!({}));
    assert_eq!(
        state["checkpoint"],
        json!({
            "thread_id": "t",
            "checkpoint_ns": "",
            "checkpoint_id": null,
            "checkpoint_map": null,
        })
    );
    assert!(state["created_at"].is_string());
}

#[tokio::test]
async fn stream_run_sets_sse_headers_and_events() {
    let (app, _) = app();
    let (head, events) = stream_run(
        app,
        "t-9",
        json!({"assistant_id": "agent", "input": {"messages": [human("hi")]}, "stream_mode": ["messages"]}),
    )
    .await;

    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(head.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(head.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(head.headers()[header::CONNECTION], "keep-alive");

    let run_id = events[0].json()["run_id"].as_str().unwrap().to_string();
    assert_eq!(
        head.headers()[header::CONTENT_LOCATION],
        format!("/threads/t-9/runs/{run_id}").as_str()
    );
    assert_eq!(event_names(&events), vec!["metadata", "messages", "messages", "end"]);
}

#[tokio::test]
async fn hi_then_state_shows_two_messages() {
    let (app, _) = app();
    stream_run(app.clone(), "t", json!({"input": {"messages": [human("hi")]}})).await;

    let (_, state) = get_json(app, "/threads/t/state").await;
    let messages = state["values"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], json!("human"));
    assert_eq!(messages[0]["content"], json!("hi"));
    assert_eq!(messages[1]["type"], json!("ai"));
    assert_eq!(messages[1]["content"], json!("hello"));
}

#[tokio::test]
async fn two_runs_leave_four_messages() {
    let (app, _) = app();
    stream_run(app.clone(), "t", json!({"input": {"messages": [human("hi")]}})).await;
    stream_run(app.clone(), "t", json!({"input": {"messages": [{"role": "user", "content": "more"}]}})).await;

    let (_, state) = get_json(app, "/threads/t/state").await;
    assert_eq!(state["values"]["messages"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn stream_run_tolerates_garbage_body() {
    let (app, store) = app();
    let resp = post_raw(app, "/threads/g/runs/stream", "garbage").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let events = parse_sse(&body_string(resp).await);
    assert_eq!(events.last().map(|e| e.event.as_str()), Some("end"));
    assert!(store.get_thread("g").is_some());
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let (app, _) = app();
    let resp = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/threads")
                .header("origin", "http://localhost:3000")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
