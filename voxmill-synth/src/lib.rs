//! voxmill-synth library interface
//!
//! Text-to-speech and voice-conversion service: audio post-processing,
//! synthesis engines, batch orchestration and the HTTP API. Exposed as a
//! library so integration tests can build the router directly.

pub mod api;
pub mod audio;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod speakers;

pub use crate::error::{ApiError, ApiResult, Result, SynthError};

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;
use voxmill_common::events::EventBus;

use crate::batch::{BatchOrchestrator, JobStore};
use crate::config::Settings;
use crate::engine::EngineRegistry;
use crate::pipeline::PostProcessingPipeline;
use crate::services::{TtsService, VcService, OUTPUTS_ROUTE};
use crate::speakers::SpeakerRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub engines: Arc<EngineRegistry>,
    pub speakers: SpeakerRegistry,
    pub tts: TtsService,
    pub vc: VcService,
    pub batch: BatchOrchestrator,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let engines = Arc::new(EngineRegistry::new(
            &settings.models_dir,
            settings.require_model_assets,
            settings.sample_rate,
        ));
        Self::with_engines(settings, engines)
    }

    /// Build state around an existing engine registry
    pub fn with_engines(settings: Settings, engines: Arc<EngineRegistry>) -> Self {
        let event_bus = EventBus::new(settings.event_capacity);
        let speakers = SpeakerRegistry::new(&settings.speaker_dir);
        let pipeline = PostProcessingPipeline::new(settings.target_lufs);

        let tts = TtsService::new(
            Arc::clone(&engines),
            settings.tts_engine,
            pipeline.clone(),
            &settings.output_dir,
        );
        let vc = VcService::new(
            Arc::clone(&engines),
            settings.vc_engine,
            speakers.clone(),
            pipeline,
            &settings.output_dir,
            settings.sample_rate,
        );
        let batch = BatchOrchestrator::new(
            tts.clone(),
            JobStore::new(),
            event_bus.clone(),
            settings.max_batch_items,
        );

        Self {
            settings: Arc::new(settings),
            engines,
            speakers,
            tts,
            vc,
            batch,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let v1 = Router::new()
        .merge(api::tts_routes())
        .merge(api::vc_routes())
        .merge(api::profile_routes())
        .merge(api::batch_routes())
        .route("/batch/events", get(api::batch_event_stream));

    let cors = cors_layer(&state.settings.allowed_origins);
    let outputs = ServeDir::new(&state.settings.output_dir);

    Router::new()
        .merge(api::health_routes())
        .nest("/api/v1", v1)
        .nest_service(OUTPUTS_ROUTE, outputs)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
