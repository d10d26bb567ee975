//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::engine::{TtsEngineKind, VcEngineKind};
use crate::AppState;

/// Configured engine per capability
#[derive(Debug, Serialize)]
pub struct EngineSelection {
    pub tts: TtsEngineKind,
    pub vc: VcEngineKind,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Module name ("voxmill-synth")
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub engines: EngineSelection,
    /// Engines instantiated so far (`tts_xtts`, `vc_rvc`, ...)
    pub loaded_engines: Vec<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "voxmill-synth".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        engines: EngineSelection {
            tts: state.tts.engine_kind(),
            vc: state.vc.engine_kind(),
        },
        loaded_engines: state.engines.loaded_engines().await,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
