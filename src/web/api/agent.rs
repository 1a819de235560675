//! Agent task endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ApiResult;
use crate::agent::ResponseMetadata;
use crate::error::Error;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub agent: String,
    pub content: String,
    pub metadata: Option<ResponseMetadata>,
}

pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskRequest>,
) -> ApiResult<TaskResponse> {
    let task = req
        .task
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::InvalidInput("task is required".to_string()))?;

    let response = state.coordinator.route(&task).await;
    Ok(Json(TaskResponse {
        agent: response.agent_name,
        content: response.content,
        metadata: response.metadata,
    }))
}
