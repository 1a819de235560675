//! Service and hardware endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{ApiResult, ErrorResponse};
use crate::error::Error;
use crate::hardware::{select_model_tier, HardwareProfile, ModelRecommendation};
use crate::web::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
    })
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "running",
        "service": "orchd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Probe hardware off the async runtime; the GPU probe shells out.
pub async fn profile(state: &AppState) -> Result<HardwareProfile, ErrorResponse> {
    let profiler = state.profiler.clone();
    tokio::task::spawn_blocking(move || profiler.profile())
        .await
        .map_err(|e| Error::Other(format!("hardware probe panicked: {}", e)).into())
}

pub async fn hardware(State(state): State<Arc<AppState>>) -> ApiResult<HardwareProfile> {
    Ok(Json(profile(&state).await?))
}

pub async fn recommended(State(state): State<Arc<AppState>>) -> ApiResult<ModelRecommendation> {
    let profile = profile(&state).await?;
    Ok(Json(select_model_tier(&profile)))
}
