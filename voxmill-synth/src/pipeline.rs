//! Post-processing pipeline applied to every synthesized or converted buffer
//!
//! TTS: trim (25 dB) → normalize → soft limit.
//! VC: denoise (optional) → spectral transform → trim (30 dB) → normalize →
//! soft limit → dither.
//!
//! A failing stage never aborts the request. Normalization falls back to
//! peak normalization; any other stage passes its input through unchanged.
//! Either way the stage is recorded in [`PipelineMetrics::fallbacks`].

use serde::Serialize;
use tracing::{debug, warn};

use crate::audio::denoise::try_denoise;
use crate::audio::trim::SilenceTrimmer;
use crate::audio::{
    add_dither, soft_limit, transform, AudioBuffer, LoudnessNormalizer, NormalizationResult,
    TransformParameters,
};

/// Trim threshold for synthesized speech
pub const TTS_TRIM_TOP_DB: f32 = 25.0;

/// Trim threshold for converted voice
pub const VC_TRIM_TOP_DB: f32 = 30.0;

/// Stage identifiers used in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Denoise,
    Transform,
    Trim,
    Normalize,
}

/// What the pipeline did to one buffer
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetrics {
    pub input_samples: usize,
    pub output_samples: usize,
    pub trimmed_samples: usize,
    pub denoised: bool,
    pub transformed: bool,
    pub limited: bool,
    pub dithered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationResult>,
    pub fallbacks: Vec<PipelineStage>,
}

/// Processed buffer plus metrics
#[derive(Debug, Clone)]
pub struct ProcessedAudio {
    pub buffer: AudioBuffer,
    pub metrics: PipelineMetrics,
}

/// Fixed-order post-processing chain
#[derive(Debug, Clone)]
pub struct PostProcessingPipeline {
    normalizer: LoudnessNormalizer,
    tts_trimmer: SilenceTrimmer,
    vc_trimmer: SilenceTrimmer,
}

impl PostProcessingPipeline {
    pub fn new(target_lufs: f64) -> Self {
        Self {
            normalizer: LoudnessNormalizer::new(target_lufs),
            tts_trimmer: SilenceTrimmer::new(TTS_TRIM_TOP_DB),
            vc_trimmer: SilenceTrimmer::new(VC_TRIM_TOP_DB),
        }
    }

    pub fn target_lufs(&self) -> f64 {
        self.normalizer.target_lufs()
    }

    /// Trim → normalize → soft limit
    pub fn process_tts(&self, buffer: AudioBuffer) -> ProcessedAudio {
        let mut metrics = PipelineMetrics {
            input_samples: buffer.len(),
            ..Default::default()
        };

        let buffer = self.trim(&self.tts_trimmer, buffer, &mut metrics);
        let mut buffer = self.normalize(buffer, &mut metrics);
        metrics.limited = soft_limit(&mut buffer);

        metrics.output_samples = buffer.len();
        debug!(
            input_samples = metrics.input_samples,
            output_samples = metrics.output_samples,
            limited = metrics.limited,
            "TTS post-processing complete"
        );
        ProcessedAudio { buffer, metrics }
    }

    /// Denoise (optional) → transform → trim → normalize → soft limit → dither
    pub fn process_vc(
        &self,
        buffer: AudioBuffer,
        params: &TransformParameters,
        denoise: bool,
    ) -> ProcessedAudio {
        let mut metrics = PipelineMetrics {
            input_samples: buffer.len(),
            ..Default::default()
        };

        let buffer = if denoise {
            match try_denoise(&buffer) {
                Ok(denoised) => {
                    metrics.denoised = true;
                    denoised
                }
                Err(e) => {
                    warn!(error = %e, "Denoise stage failed, continuing with unmodified audio");
                    metrics.fallbacks.push(PipelineStage::Denoise);
                    buffer
                }
            }
        } else {
            buffer
        };

        let buffer = match transform(&buffer, params) {
            Ok(transformed) => {
                metrics.transformed = true;
                transformed
            }
            Err(e) => {
                warn!(
                    error = %e,
                    speaker = %params.target_speaker,
                    "Spectral transform failed, continuing with unmodified audio"
                );
                metrics.fallbacks.push(PipelineStage::Transform);
                buffer
            }
        };

        let buffer = self.trim(&self.vc_trimmer, buffer, &mut metrics);
        let mut buffer = self.normalize(buffer, &mut metrics);
        metrics.limited = soft_limit(&mut buffer);
        add_dither(&mut buffer);
        metrics.dithered = true;

        metrics.output_samples = buffer.len();
        debug!(
            input_samples = metrics.input_samples,
            output_samples = metrics.output_samples,
            denoised = metrics.denoised,
            transformed = metrics.transformed,
            "VC post-processing complete"
        );
        ProcessedAudio { buffer, metrics }
    }

    fn trim(
        &self,
        trimmer: &SilenceTrimmer,
        buffer: AudioBuffer,
        metrics: &mut PipelineMetrics,
    ) -> AudioBuffer {
        match trimmer.trim(&buffer) {
            Ok((trimmed, bounds)) => {
                metrics.trimmed_samples = bounds.removed();
                trimmed
            }
            Err(e) => {
                warn!(error = %e, "Trim stage failed, continuing with untrimmed audio");
                metrics.fallbacks.push(PipelineStage::Trim);
                buffer
            }
        }
    }

    fn normalize(&self, buffer: AudioBuffer, metrics: &mut PipelineMetrics) -> AudioBuffer {
        let (normalized, result) = self.normalizer.normalize(&buffer);
        if result.fallback_used() {
            metrics.fallbacks.push(PipelineStage::Normalize);
        }
        metrics.normalization = Some(result);
        normalized
    }
}

impl Default for PostProcessingPipeline {
    fn default() -> Self {
        Self::new(crate::audio::loudness::DEFAULT_TARGET_LUFS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BandColoring;

    const SR: u32 = 22050;

    fn tone_with_silence(amplitude: f32) -> AudioBuffer {
        let mut samples = vec![0.0; 2205];
        samples.extend(
            (0..SR as usize).map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SR as f32).sin()),
        );
        samples.extend(vec![0.0; 2205]);
        AudioBuffer::new(samples, SR).unwrap()
    }

    #[test]
    fn test_tts_chain_trims_and_normalizes() {
        let pipeline = PostProcessingPipeline::new(-16.0);
        let input = tone_with_silence(0.05);
        let processed = pipeline.process_tts(input.clone());

        assert!(processed.buffer.len() < input.len());
        assert!(processed.metrics.trimmed_samples >= 4000);
        let normalization = processed.metrics.normalization.as_ref().unwrap();
        assert!(normalization.normalized);
        assert!(processed.metrics.fallbacks.is_empty());
        assert!(!processed.metrics.limited);
        assert!(!processed.metrics.dithered);
        assert!(processed.buffer.peak() <= 0.95);
    }

    #[test]
    fn test_vc_chain_runs_every_stage() {
        let pipeline = PostProcessingPipeline::default();
        let params = TransformParameters::new("speaker_001")
            .with_pitch_ratio(1.15)
            .with_coloring(BandColoring::new(1.1, 0.9, 1.2));
        let processed = pipeline.process_vc(tone_with_silence(0.3), &params, true);

        assert!(processed.metrics.denoised);
        assert!(processed.metrics.transformed);
        assert!(processed.metrics.dithered);
        assert!(processed.metrics.fallbacks.is_empty());
        assert!(processed.buffer.peak() <= 0.95 + 1e-4);
    }

    #[test]
    fn test_silent_input_survives() {
        let pipeline = PostProcessingPipeline::default();
        let processed = pipeline.process_tts(AudioBuffer::new(vec![0.0; 1000], SR).unwrap());
        assert!(processed.buffer.is_empty());
        let normalization = processed.metrics.normalization.unwrap();
        assert!(!normalization.normalized);
    }

    #[test]
    fn test_stage_failures_are_recorded_not_fatal() {
        // At 100 Hz sampling neither the rumble filter nor the loudness shelf can be designed
        let pipeline = PostProcessingPipeline::default();
        let input = AudioBuffer::new((0..400).map(|i| ((i % 7) as f32 - 3.0) * 0.1).collect(), 100).unwrap();
        let processed = pipeline.process_vc(input, &TransformParameters::new("default"), true);

        assert!(processed.metrics.fallbacks.contains(&PipelineStage::Denoise));
        assert!(processed.metrics.fallbacks.contains(&PipelineStage::Normalize));
        assert!(!processed.buffer.is_empty());
    }
}
