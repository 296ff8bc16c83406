use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{ApiError, AppState};
use crate::orchestrator::RunRequest;
use crate::types::Thread;

/// Parse a request body leniently: anything that is not a JSON object is
/// treated as `{}`.
fn lenient_body(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(obj)) => obj,
        Ok(_) => Map::new(),
        Err(err) => {
            if !body.is_empty() {
                debug!(error = %err, "ignoring unparseable request body");
            }
            Map::new()
        }
    }
}

pub(super) async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub(super) async fn create_thread(State(state): State<AppState>, body: Bytes) -> Json<Thread> {
    let body = lenient_body(&body);
    let thread_id = body
        .get("thread_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let metadata = body.get("metadata").and_then(Value::as_object).cloned();

    let thread = state.store.create_thread(thread_id, metadata);
    debug!(thread_id = %thread.thread_id, "thread created");
    Json(thread)
}

pub(super) async fn get_thread_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Json<Value> {
    let Some(thread) = state.store.get_thread(&thread_id) else {
        return Json(json!({
            "values": {},
            "next": [],
            "tasks": [],
            "metadata": {},
            "created_at": null,
            "checkpoint": {},
            "parent_checkpoint": null,
        }));
    };

    Json(json!({
        "values": thread.values,
        "next": [],
        "tasks": [],
        "metadata": thread.metadata,
        "created_at": thread.created_at,
        "checkpoint": {
            "thread_id": thread.thread_id,
            "checkpoint_ns": "",
            "checkpoint_id": null,
            "checkpoint_map": null,
        },
        "parent_checkpoint": null,
    }))
}

pub(super) async fn stream_run(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if HeaderValue::from_str(&thread_id).is_err() {
        return Err(ApiError::BadRequest(format!(
            "thread id is not valid in a header: {thread_id:?}"
        )));
    }
    let request = RunRequest::from_body(thread_id, &Value::Object(lenient_body(&body)));
    let handle = state.orchestrator.start(request);

    let location = HeaderValue::from_str(&handle.content_location())
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CONTENT_LOCATION, location);

    Ok((headers, Body::from_stream(handle.into_body_stream())).into_response())
}
