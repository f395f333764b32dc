use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bold::errors::BackendError;
use serde_json::json;
use std::net::AddrParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid server address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted settings key, e.g. `backend.api_key`
pub fn to_env_var(field: &str) -> String {
    format!("BOLD_{}", field.replace('.', "__").to_uppercase())
}

/// Failures of the ask endpoint that happen before any event is streamed.
///
/// Once the first byte of an answer is out, the status line is committed and
/// failures travel in-band as an `error` event instead.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request format")]
    Validation,
    #[error("{0}")]
    Configuration(String),
    #[error("Failed to fetch AI response: {message}")]
    Upstream { status: StatusCode, message: String },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upstream { status, .. } => *status,
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::MissingConfiguration | BackendError::InvalidConfiguration => {
                ApiError::Configuration(err.to_string())
            }
            BackendError::Upstream { status, .. } => ApiError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: err.to_string(),
            },
            BackendError::Http(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({
                "type": "error",
                "content": self.to_string(),
            })),
        )
            .into_response()
    }
}
