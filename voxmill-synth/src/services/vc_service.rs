//! Voice conversion: decode upload, convert, post-process, write WAV

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{guarded_engine_call, persist_wav};
use crate::audio::io::{decode_base64_audio, decode_wav};
use crate::audio::resample::Resampler;
use crate::audio::{AudioBuffer, F0Method};
use crate::engine::{EngineRegistry, VcEngineKind, VoiceTarget};
use crate::error::{Result, SynthError};
use crate::pipeline::{PipelineMetrics, PostProcessingPipeline};
use crate::speakers::SpeakerRegistry;

/// Conversion request as accepted over HTTP
#[derive(Debug, Clone)]
pub struct VcRequest {
    /// Base64 WAV, optionally as a `data:` URL
    pub source_audio: String,
    pub target_speaker: String,
    pub preserve_pitch: bool,
    pub denoise: bool,
    pub f0_method: F0Method,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub file_size: u64,
    pub sample_rate: u32,
    pub original_duration: f64,
    pub output_duration: f64,
    pub processing_time: f64,
    pub metrics: PipelineMetrics,
}

#[derive(Clone)]
pub struct VcService {
    engines: Arc<EngineRegistry>,
    engine_kind: VcEngineKind,
    speakers: SpeakerRegistry,
    pipeline: PostProcessingPipeline,
    output_dir: PathBuf,
    sample_rate: u32,
}

impl VcService {
    pub fn new(
        engines: Arc<EngineRegistry>,
        engine_kind: VcEngineKind,
        speakers: SpeakerRegistry,
        pipeline: PostProcessingPipeline,
        output_dir: impl Into<PathBuf>,
        sample_rate: u32,
    ) -> Self {
        Self {
            engines,
            engine_kind,
            speakers,
            pipeline,
            output_dir: output_dir.into(),
            sample_rate,
        }
    }

    pub fn engine_kind(&self) -> VcEngineKind {
        self.engine_kind
    }

    /// Speaker ids this engine can convert to
    pub fn speaker_ids(&self) -> Vec<String> {
        self.speakers.vc_speaker_ids(self.engine_kind)
    }

    /// Decode the uploaded WAV and bring it to the service sample rate
    pub fn decode_source(&self, payload: &str) -> Result<AudioBuffer> {
        let bytes = decode_base64_audio(payload).map_err(|e| SynthError::Validation(e.to_string()))?;
        let source = decode_wav(&bytes).map_err(|e| SynthError::Validation(e.to_string()))?;
        if source.is_empty() {
            return Err(SynthError::Validation("source audio contains no samples".into()));
        }
        if source.sample_rate() == self.sample_rate {
            return Ok(source);
        }

        let resampled = Resampler::resample(source.samples(), source.sample_rate(), self.sample_rate)?;
        debug!(
            from = source.sample_rate(),
            to = self.sample_rate,
            samples = resampled.len(),
            "Resampled source audio"
        );
        Ok(AudioBuffer::new(resampled, self.sample_rate)?)
    }

    /// Convert into `vc_<uuid>.wav`
    pub async fn convert(&self, request: &VcRequest) -> Result<ConversionOutput> {
        let started = Instant::now();
        let profile = self.speakers.get(&request.target_speaker)?;

        let service = self.clone();
        let payload = request.source_audio.clone();
        let source = tokio::task::spawn_blocking(move || service.decode_source(&payload))
            .await
            .map_err(|e| SynthError::ProcessingFailure(format!("decode task failed: {}", e)))??;
        let original_duration = source.duration_seconds();

        let target = VoiceTarget {
            profile,
            preserve_pitch: request.preserve_pitch,
            f0_method: request.f0_method,
        };
        let engine = self.engines.acquire_vc(self.engine_kind).await?;
        let (converted, params) = {
            let engine = engine.lock().await;
            let converted =
                guarded_engine_call(self.engine_kind.as_str(), engine.convert(&source, &target)).await?;
            (converted, engine.transform_parameters(&target))
        };

        let pipeline = self.pipeline.clone();
        let output_dir = self.output_dir.clone();
        let file_name = format!("vc_{}.wav", Uuid::new_v4());
        let name = file_name.clone();
        let denoise = request.denoise;
        let (processed, path, file_size) = tokio::task::spawn_blocking(move || -> Result<_> {
            let processed = pipeline.process_vc(converted, &params, denoise);
            let (path, size) = persist_wav(&output_dir, &name, &processed.buffer)?;
            Ok((processed, path, size))
        })
        .await
        .map_err(|e| SynthError::ProcessingFailure(format!("post-processing task failed: {}", e)))??;

        let output = ConversionOutput {
            file_name,
            path,
            file_size,
            sample_rate: processed.buffer.sample_rate(),
            original_duration,
            output_duration: processed.buffer.duration_seconds(),
            processing_time: started.elapsed().as_secs_f64(),
            metrics: processed.metrics,
        };
        info!(
            file = %output.file_name,
            speaker = %target.profile.id,
            engine = %self.engine_kind,
            original_duration = output.original_duration,
            output_duration = output.output_duration,
            "Conversion complete"
        );
        Ok(output)
    }
}
