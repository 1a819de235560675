//! API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;

pub mod agent;
pub mod models;
pub mod project;
pub mod system;

/// JSON error body: `{"status": "...", "message": "..."}`.
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub code: StatusCode,
    pub status: &'static str,
    pub message: String,
}

impl From<Error> for ErrorResponse {
    fn from(e: Error) -> Self {
        let code = match &e {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::BackendUnavailable(_) | Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if e.is_client_fault() {
            tracing::debug!("Rejected request: {}", e);
        } else {
            tracing::error!("Request failed: {}", e);
        }
        Self {
            code,
            status: e.status(),
            message: e.to_string(),
        }
    }
}

impl From<crate::providers::BackendError> for ErrorResponse {
    fn from(e: crate::providers::BackendError) -> Self {
        Error::from(e).into()
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ErrorResponse>;
