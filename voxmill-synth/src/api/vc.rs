//! Voice conversion endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::audio::F0Method;
use crate::engine::VcEngineKind;
use crate::error::{ApiError, ApiResult};
use crate::services::{output_url, VcRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VcBody {
    pub source_audio: String,
    pub target_speaker: String,
    #[serde(default = "default_true")]
    pub preserve_pitch: bool,
    #[serde(default = "default_true")]
    pub denoise: bool,
    #[serde(default = "default_f0_method")]
    pub f0_method: String,
}

fn default_true() -> bool {
    true
}

fn default_f0_method() -> String {
    F0Method::default().as_str().to_string()
}

#[derive(Debug, Serialize)]
pub struct VcResponse {
    pub audio_url: String,
    pub processing_time: f64,
    pub file_size: u64,
    pub sample_rate: u32,
    pub original_duration: f64,
    pub output_duration: f64,
}

#[derive(Debug, Serialize)]
pub struct VcSpeakersResponse {
    pub engine: VcEngineKind,
    pub speakers: Vec<String>,
}

/// POST /api/v1/vc
pub async fn convert(
    State(state): State<AppState>,
    payload: Result<Json<VcBody>, JsonRejection>,
) -> ApiResult<Json<VcResponse>> {
    let body = json_body(payload)?;
    let f0_method: F0Method = body.f0_method.parse().map_err(ApiError::Validation)?;
    info!(
        target_speaker = %body.target_speaker,
        preserve_pitch = body.preserve_pitch,
        denoise = body.denoise,
        f0_method = %f0_method,
        "VC request"
    );

    let output = state
        .vc
        .convert(&VcRequest {
            source_audio: body.source_audio,
            target_speaker: body.target_speaker,
            preserve_pitch: body.preserve_pitch,
            denoise: body.denoise,
            f0_method,
        })
        .await?;

    Ok(Json(VcResponse {
        audio_url: output_url(&output.file_name),
        processing_time: output.processing_time,
        file_size: output.file_size,
        sample_rate: output.sample_rate,
        original_duration: output.original_duration,
        output_duration: output.output_duration,
    }))
}

/// GET /api/v1/vc/speakers
pub async fn list_speakers(State(state): State<AppState>) -> Json<VcSpeakersResponse> {
    Json(VcSpeakersResponse {
        engine: state.vc.engine_kind(),
        speakers: state.vc.speaker_ids(),
    })
}

pub fn vc_routes() -> Router<AppState> {
    Router::new()
        .route("/vc", post(convert))
        .route("/vc/speakers", get(list_speakers))
}
