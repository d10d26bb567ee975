//! Placeholder engines: tone generators for TTS, pass-through for VC
//!
//! They give the service a deterministic shape to run against end to end.
//! Output duration scales with text length, speed nudges the base pitch.

use std::f32::consts::PI;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use super::{EngineError, TtsEngine, TtsEngineKind, TtsRequest, VcEngine, VcEngineKind, VoiceTarget};
use crate::audio::AudioBuffer;

/// Fade applied to both ends of generated speech
const FADE_SECONDS: f32 = 0.05;

/// Tone-generating stand-in for a neural TTS model
#[derive(Debug, Clone)]
pub struct PlaceholderTtsEngine {
    kind: TtsEngineKind,
    sample_rate: u32,
}

impl PlaceholderTtsEngine {
    pub fn new(kind: TtsEngineKind, sample_rate: u32) -> Self {
        Self { kind, sample_rate }
    }

    fn render(&self, request: &TtsRequest) -> Vec<f32> {
        let chars = request.text.chars().count() as f32;
        let mut rng = rand::thread_rng();
        match self.kind {
            TtsEngineKind::Xtts => {
                let t = self.timeline((chars * 0.05).max(1.0));
                let freq = 440.0
                    * if request.speed > 1.0 {
                        1.1
                    } else if request.speed < 1.0 {
                        0.9
                    } else {
                        1.0
                    };
                let mut samples: Vec<f32> = t
                    .iter()
                    .map(|&t| 0.3 * (2.0 * PI * freq * t).sin() + 0.05 * gaussian(&mut rng))
                    .collect();
                apply_fades(&mut samples, self.sample_rate);
                samples
            }
            TtsEngineKind::OpenVoice => {
                let t = self.timeline((chars * 0.06).max(1.0));
                let mut samples: Vec<f32> = t
                    .iter()
                    .map(|&t| {
                        [220.0f32, 440.0, 880.0]
                            .iter()
                            .enumerate()
                            .map(|(i, freq)| {
                                0.2 / (i + 1) as f32 * (2.0 * PI * freq * request.speed * t).sin()
                            })
                            .sum::<f32>()
                    })
                    .collect();
                for sample in &mut samples {
                    *sample *= 1.0 - 0.3 * rng.gen::<f32>();
                    *sample += 0.02 * gaussian(&mut rng);
                }
                samples
            }
            TtsEngineKind::Bark => {
                let duration = (chars * 0.08).max(1.5);
                let t = self.timeline(duration);
                let mut samples = vec![0.0f32; t.len()];
                for formant in [800.0f32, 1200.0, 2400.0] {
                    let amplitude = 0.15 * rng.gen::<f32>();
                    for (sample, &t) in samples.iter_mut().zip(&t) {
                        let modulation = 1.0 + 0.1 * (2.0 * PI * 5.0 * t).sin();
                        *sample += amplitude * (2.0 * PI * formant * request.speed * modulation * t).sin();
                    }
                }

                // Syllable-like amplitude segments
                let segments = ((duration * 3.0) as usize).max(1);
                let segment_len = samples.len() / segments;
                if segment_len > 0 {
                    for chunk in samples.chunks_mut(segment_len).take(segments) {
                        let level = rng.gen_range(0.2f32..1.0);
                        chunk.iter_mut().for_each(|s| *s *= level);
                    }
                }
                samples
            }
        }
    }

    fn timeline(&self, seconds: f32) -> Vec<f32> {
        let len = (self.sample_rate as f32 * seconds) as usize;
        (0..len).map(|i| i as f32 / self.sample_rate as f32).collect()
    }
}

#[async_trait]
impl TtsEngine for PlaceholderTtsEngine {
    fn kind(&self) -> TtsEngineKind {
        self.kind
    }

    async fn synthesize(&self, request: &TtsRequest) -> Result<AudioBuffer, EngineError> {
        if request.text.trim().is_empty() {
            return Err(EngineError::ProcessingFailure("nothing to synthesize".into()));
        }
        let samples = self.render(request);
        debug!(
            engine = %self.kind,
            speaker = %request.speaker_id,
            samples = samples.len(),
            "Placeholder synthesis"
        );
        AudioBuffer::new(samples, self.sample_rate)
            .map_err(|e| EngineError::ProcessingFailure(e.to_string()))
    }
}

/// Pass-through stand-in for a neural VC model
///
/// Voice character comes entirely from the pipeline's spectral transform.
#[derive(Debug, Clone)]
pub struct PlaceholderVcEngine {
    kind: VcEngineKind,
}

impl PlaceholderVcEngine {
    pub fn new(kind: VcEngineKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl VcEngine for PlaceholderVcEngine {
    fn kind(&self) -> VcEngineKind {
        self.kind
    }

    async fn convert(&self, source: &AudioBuffer, target: &VoiceTarget) -> Result<AudioBuffer, EngineError> {
        if source.is_empty() {
            return Err(EngineError::ProcessingFailure("source audio is empty".into()));
        }
        debug!(engine = %self.kind, speaker = %target.profile.id, "Placeholder conversion");
        Ok(source.clone())
    }
}

/// Linear fade in/out over `FADE_SECONDS`
fn apply_fades(samples: &mut [f32], sample_rate: u32) {
    let fade = ((FADE_SECONDS * sample_rate as f32) as usize).min(samples.len() / 2);
    if fade < 2 {
        return;
    }
    let len = samples.len();
    for i in 0..fade {
        let gain = i as f32 / (fade - 1) as f32;
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}

/// Standard normal sample (Box-Muller)
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
    let u2 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
