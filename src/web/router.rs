//! Route definitions for the daemon.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use super::{api, AppState};

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the API router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // System
        .route("/system/hardware", get(api::system::hardware))
        .route("/models/recommended", get(api::system::recommended))
        // Backend and models
        .route("/ollama/status", get(api::models::status))
        .route("/ollama/models", get(api::models::list))
        .route("/models/prepare", post(api::models::prepare))
        .route("/models/pull", post(api::models::pull))
        .route("/models/load", post(api::models::load))
        .route("/models/stop", post(api::models::stop))
        // Project
        .route(
            "/project/index",
            post(api::project::start_index).get(api::project::list_jobs),
        )
        .route("/project/index/:id", get(api::project::job_status))
        .route("/project/query", post(api::project::query))
        // Agents
        .route("/agent/task", post(api::agent::run_task))
}

/// Create the full app router.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::system::root))
        .route("/health", get(api::system::health))
        .merge(create_api_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
