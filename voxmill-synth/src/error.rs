//! Error types for voxmill-synth
//!
//! `SynthError` is the service-level taxonomy; `ApiError` maps it onto HTTP
//! responses for single (non-batch) requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::audio::DspError;
use crate::engine::EngineError;

/// Service error taxonomy
#[derive(Debug, Error)]
pub enum SynthError {
    /// Bad request parameters (empty text, out-of-range speed, unsupported tag)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing model or speaker asset
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// DSP stage or engine failure
    #[error("Processing failure: {0}")]
    ProcessingFailure(String),

    /// Some batch items failed while the job itself completed
    #[error("{failed} of {total} batch items failed")]
    PartialBatchFailure { failed: usize, total: usize },

    /// File I/O error (writing outputs)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// voxmill-common error
    #[error("Common error: {0}")]
    Common(#[from] voxmill_common::Error),
}

impl From<DspError> for SynthError {
    fn from(err: DspError) -> Self {
        SynthError::ProcessingFailure(err.to_string())
    }
}

impl From<EngineError> for SynthError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ResourceNotFound(msg) => SynthError::ResourceNotFound(msg),
            EngineError::ProcessingFailure(msg) => SynthError::ProcessingFailure(msg),
        }
    }
}

impl From<hound::Error> for SynthError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => SynthError::Io(io),
            other => SynthError::ProcessingFailure(format!("WAV encoding failed: {}", other)),
        }
    }
}

/// Convenience Result type using SynthError
pub type Result<T> = std::result::Result<T, SynthError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request parameters (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing model or speaker asset (404)
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Unknown job or profile id (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Processing failure (500)
    #[error("Processing failure: {0}")]
    ProcessingFailure(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SynthError> for ApiError {
    fn from(err: SynthError) -> Self {
        match err {
            SynthError::Validation(msg) => ApiError::Validation(msg),
            SynthError::ResourceNotFound(msg) => ApiError::ResourceNotFound(msg),
            SynthError::ProcessingFailure(msg) => ApiError::ProcessingFailure(msg),
            SynthError::Common(voxmill_common::Error::InvalidInput(msg)) => {
                ApiError::Validation(msg)
            }
            SynthError::Common(voxmill_common::Error::NotFound(msg)) => {
                ApiError::ResourceNotFound(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::ResourceNotFound(msg) => {
                (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND", msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::ProcessingFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROCESSING_FAILURE",
                msg,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
