//! API error handling.
//!
//! One unified error type for the HTTP endpoints, mapped onto status codes
//! and JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use glance_core::{DetectError, EmbedError};
use glance_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Client provided invalid input (missing file, undecodable image, ...).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The uploaded face's embedding is already registered.
    #[error("identity already registered")]
    AlreadyRegistered,

    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyRegistered => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyRegistered => Self::AlreadyRegistered,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<DetectError> for ApiError {
    fn from(err: DetectError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<EmbedError> for ApiError {
    fn from(err: EmbedError) -> Self {
        Self::Internal(err.to_string())
    }
}
