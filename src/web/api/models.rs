//! Inference backend and model lifecycle endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{system::profile, ApiResult};
use crate::error::Error;
use crate::hardware::{select_model_tier, ModelTier};
use crate::providers::{load_model, stop_model, ModelInfo};
use crate::web::AppState;

#[derive(Serialize)]
pub struct BackendStatus {
    pub running: bool,
    pub url: String,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<BackendStatus> {
    Json(BackendStatus {
        running: state.backend.is_running().await,
        url: state.settings.backend.base_url.clone(),
    })
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ModelInfo>> {
    if !state.backend.is_running().await {
        return Err(Error::BackendUnavailable(format!(
            "{} is not running",
            state.backend.name()
        ))
        .into());
    }
    Ok(Json(state.backend.list_models().await?))
}

#[derive(Deserialize)]
pub struct ModelRequest {
    #[serde(default)]
    pub model: Option<String>,
}

impl ModelRequest {
    fn model(self) -> Result<String, Error> {
        match self.model {
            Some(m) if !m.trim().is_empty() => Ok(m.trim().to_string()),
            _ => Err(Error::InvalidInput("model is required".to_string())),
        }
    }
}

#[derive(Serialize)]
pub struct ModelActionResponse {
    pub status: &'static str,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<ModelTier>,
}

impl ModelActionResponse {
    fn new(status: &'static str, model: String) -> Self {
        Self {
            status,
            model,
            tier: None,
        }
    }
}

/// Pull the model suggested for this machine's tier.
pub async fn prepare(State(state): State<Arc<AppState>>) -> ApiResult<ModelActionResponse> {
    let recommendation = select_model_tier(&profile(&state).await?);
    let model = recommendation.suggested_model.clone();
    tracing::info!("Preparing {} for tier {}", model, recommendation.tier);

    state.backend.pull(&model).await?;
    Ok(Json(ModelActionResponse {
        tier: Some(recommendation.tier),
        ..ModelActionResponse::new("pulled", model)
    }))
}

pub async fn pull(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModelRequest>,
) -> ApiResult<ModelActionResponse> {
    let model = req.model()?;
    state.backend.pull(&model).await?;
    Ok(Json(ModelActionResponse::new("pulled", model)))
}

pub async fn load(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModelRequest>,
) -> ApiResult<ModelActionResponse> {
    let model = req.model()?;
    load_model(state.backend.as_ref(), &model).await?;
    Ok(Json(ModelActionResponse::new("loaded", model)))
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModelRequest>,
) -> ApiResult<ModelActionResponse> {
    let model = req.model()?;
    stop_model(state.backend.as_ref(), &model).await?;
    Ok(Json(ModelActionResponse::new("stopped", model)))
}
