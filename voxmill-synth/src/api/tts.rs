//! Text-to-speech endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::audio::NormalizationResult;
use crate::engine::{TtsEngineKind, TtsRequest};
use crate::error::ApiResult;
use crate::services::output_url;
use crate::speakers::SpeakerSummary;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TtsBody {
    pub text: String,
    #[serde(default = "default_speaker")]
    pub speaker_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_emotion")]
    pub emotion: String,
}

fn default_speaker() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_emotion() -> String {
    "neutral".to_string()
}

#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub audio_url: String,
    pub duration: f64,
    pub processing_time: f64,
    pub file_size: u64,
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationResult>,
}

#[derive(Debug, Serialize)]
pub struct SpeakersResponse {
    pub speakers: Vec<SpeakerSummary>,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub engine: TtsEngineKind,
    pub languages: Vec<&'static str>,
}

/// POST /api/v1/tts
pub async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<TtsBody>, JsonRejection>,
) -> ApiResult<Json<TtsResponse>> {
    let body = json_body(payload)?;
    let request = TtsRequest {
        text: body.text,
        speaker_id: body.speaker_id,
        language: body.language,
        speed: body.speed,
        emotion: body.emotion,
    };
    info!(
        chars = request.text.chars().count(),
        speaker = %request.speaker_id,
        language = %request.language,
        "TTS request"
    );

    let output = state.tts.synthesize(&request).await?;
    Ok(Json(TtsResponse {
        audio_url: output_url(&output.file_name),
        duration: output.duration,
        processing_time: output.processing_time,
        file_size: output.file_size,
        sample_rate: output.sample_rate,
        normalization: output.metrics.normalization,
    }))
}

/// GET /api/v1/tts/speakers
pub async fn list_speakers(State(state): State<AppState>) -> Json<SpeakersResponse> {
    Json(SpeakersResponse {
        speakers: state.speakers.tts_speakers(),
    })
}

/// GET /api/v1/tts/languages
pub async fn list_languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        engine: state.tts.engine_kind(),
        languages: state.tts.supported_languages().to_vec(),
    })
}

pub fn tts_routes() -> Router<AppState> {
    Router::new()
        .route("/tts", post(synthesize))
        .route("/tts/speakers", get(list_speakers))
        .route("/tts/languages", get(list_languages))
}
