//! HTTP surface: thread creation, thread state and streaming runs.

mod error;
mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::orchestrator::Orchestrator;
use crate::store::ThreadStore;

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";
/// Thread creation endpoint path.
pub const THREADS_PATH: &str = "/threads";
/// Thread state endpoint path.
pub const THREAD_STATE_PATH: &str = "/threads/:thread_id/state";
/// Streaming run endpoint path.
pub const RUN_STREAM_PATH: &str = "/threads/:thread_id/runs/stream";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ThreadStore>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// State whose orchestrator shares the given store.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            store: Arc::clone(orchestrator.store()),
            orchestrator,
        }
    }
}

/// Build the application router with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route(HEALTH_PATH, get(handlers::health))
        .route(THREADS_PATH, post(handlers::create_thread))
        .route(THREAD_STATE_PATH, get(handlers::get_thread_state))
        .route(RUN_STREAM_PATH, post(handlers::stream_run))
        .layer(cors)
        .with_state(state)
}
