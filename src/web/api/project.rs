//! Project indexing and context query endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{ApiResult, ErrorResponse};
use crate::error::Error;
use crate::indexing::IndexJob;
use crate::store::RetrievalMatch;
use crate::web::AppState;

const DEFAULT_N_RESULTS: usize = 5;

#[derive(Deserialize)]
pub struct IndexRequest {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct IndexStarted {
    pub status: &'static str,
    pub path: String,
    pub job: IndexJob,
}

/// Start a background index job and acknowledge immediately.
pub async fn start_index(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndexRequest>,
) -> Result<(StatusCode, Json<IndexStarted>), ErrorResponse> {
    let path = req
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::InvalidInput("path is required".to_string()))?;

    let job = state.jobs.start(std::path::Path::new(&path))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(IndexStarted {
            status: "indexing_started",
            path,
            job,
        }),
    ))
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Vec<IndexJob>> {
    Ok(Json(state.jobs.list()?))
}

pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<IndexJob> {
    Ok(Json(state.jobs.get(id)?))
}

#[derive(Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub n_results: Option<usize>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub results: Vec<RetrievalMatch>,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    let text = req
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| Error::InvalidInput("query is required".to_string()))?;
    let k = req.n_results.unwrap_or(DEFAULT_N_RESULTS);

    let results = state.store.query(&text, k).await?;
    Ok(Json(QueryResponse { results }))
}
