//! HTTP API handlers for voxmill-synth
//!
//! Every JSON route lives under `/api/v1`; `/health` and `/outputs/*` sit
//! at the root.

pub mod batch;
pub mod health;
pub mod profiles;
pub mod sse;
pub mod tts;
pub mod vc;

pub use batch::batch_routes;
pub use health::health_routes;
pub use profiles::profile_routes;
pub use sse::batch_event_stream;
pub use tts::tts_routes;
pub use vc::vc_routes;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{ApiError, ApiResult};

/// Unwrap a JSON body, turning malformed input into a validation error
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}
