//! Error types for orchd.

use thiserror::Error;

use crate::providers::BackendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend error: {0}")]
    Upstream(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Other(String),
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::ModelNotFound(model) => Error::NotFound(format!("model {}", model)),
            e if e.is_unreachable() => Error::BackendUnavailable(e.to_string()),
            e => Error::Upstream(e.to_string()),
        }
    }
}

impl Error {
    /// Whether the caller sent something unusable, as opposed to a service fault.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::NotFound(_) | Error::Conflict(_)
        )
    }

    /// Short machine-readable status used in API error bodies.
    pub fn status(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::BackendUnavailable(_) | Error::Store(_) => "backend_unavailable",
            Error::Upstream(_) => "upstream_error",
            Error::Config(_) => "config_error",
            Error::Io(_) | Error::Json(_) | Error::Other(_) => "internal_error",
        }
    }
}
