//! Text-to-speech: validate, synthesize, post-process, write WAV

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{guarded_engine_call, persist_wav};
use crate::engine::{EngineRegistry, SharedTtsEngine, TtsEngineKind, TtsRequest};
use crate::error::{Result, SynthError};
use crate::pipeline::{PipelineMetrics, PostProcessingPipeline};

/// Longest accepted text, in characters
pub const MAX_TEXT_CHARS: usize = 10_000;

pub const MIN_SPEED: f32 = 0.1;
pub const MAX_SPEED: f32 = 3.0;

/// One written synthesis result
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutput {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Seconds of audio after post-processing
    pub duration: f64,
    pub file_size: u64,
    pub sample_rate: u32,
    /// Seconds spent in engine + pipeline + write
    pub processing_time: f64,
    pub metrics: PipelineMetrics,
}

/// TTS front door shared by the HTTP handlers and the batch orchestrator
#[derive(Clone)]
pub struct TtsService {
    engines: Arc<EngineRegistry>,
    engine_kind: TtsEngineKind,
    pipeline: PostProcessingPipeline,
    output_dir: PathBuf,
}

impl TtsService {
    pub fn new(
        engines: Arc<EngineRegistry>,
        engine_kind: TtsEngineKind,
        pipeline: PostProcessingPipeline,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engines,
            engine_kind,
            pipeline,
            output_dir: output_dir.into(),
        }
    }

    pub fn engine_kind(&self) -> TtsEngineKind {
        self.engine_kind
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn supported_languages(&self) -> &'static [&'static str] {
        self.engine_kind.supported_languages()
    }

    /// Check request parameters before any engine work
    pub fn validate(&self, request: &TtsRequest) -> Result<()> {
        let chars = request.text.chars().count();
        if request.text.trim().is_empty() {
            return Err(SynthError::Validation("text must not be empty".into()));
        }
        if chars > MAX_TEXT_CHARS {
            return Err(SynthError::Validation(format!(
                "text is {} characters, limit is {}",
                chars, MAX_TEXT_CHARS
            )));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&request.speed) {
            return Err(SynthError::Validation(format!(
                "speed {} outside {}..={}",
                request.speed, MIN_SPEED, MAX_SPEED
            )));
        }
        if !self.engine_kind.supports_language(&request.language) {
            return Err(SynthError::Validation(format!(
                "language '{}' not supported by {}",
                request.language, self.engine_kind
            )));
        }
        Ok(())
    }

    /// Load (or reuse) the configured engine
    pub async fn acquire_engine(&self) -> Result<SharedTtsEngine> {
        Ok(self.engines.acquire_tts(self.engine_kind).await?)
    }

    /// Synthesize into `tts_<uuid>.wav`
    pub async fn synthesize(&self, request: &TtsRequest) -> Result<SynthesisOutput> {
        let file_name = format!("tts_{}.wav", Uuid::new_v4());
        self.synthesize_to_file(request, &file_name).await
    }

    /// Validate, synthesize, post-process and write `<output_dir>/<file_name>`
    pub async fn synthesize_to_file(&self, request: &TtsRequest, file_name: &str) -> Result<SynthesisOutput> {
        self.validate(request)?;
        let started = Instant::now();

        let engine = self.acquire_engine().await?;
        let raw = {
            let engine = engine.lock().await;
            guarded_engine_call(self.engine_kind.as_str(), engine.synthesize(request)).await?
        };
        debug!(samples = raw.len(), speaker = %request.speaker_id, "Engine output received");

        let pipeline = self.pipeline.clone();
        let output_dir = self.output_dir.clone();
        let name = file_name.to_string();
        let (processed, path, file_size) = tokio::task::spawn_blocking(move || -> Result<_> {
            let processed = pipeline.process_tts(raw);
            let (path, size) = persist_wav(&output_dir, &name, &processed.buffer)?;
            Ok((processed, path, size))
        })
        .await
        .map_err(|e| SynthError::ProcessingFailure(format!("post-processing task failed: {}", e)))??;

        let output = SynthesisOutput {
            file_name: file_name.to_string(),
            path,
            duration: processed.buffer.duration_seconds(),
            file_size,
            sample_rate: processed.buffer.sample_rate(),
            processing_time: started.elapsed().as_secs_f64(),
            metrics: processed.metrics,
        };
        info!(
            file = %output.file_name,
            duration = output.duration,
            processing_time = output.processing_time,
            "Synthesis complete"
        );
        Ok(output)
    }
}
