//! Approximate loudness measurement and normalization
//!
//! The score is `-0.691 + 10*log10(mean_square)` over a weighted signal:
//! a 20 Hz Butterworth high-pass (zero phase) followed by a +4 dB
//! high-shelf pre-emphasis around 1.7 kHz. This is a LUFS-like proxy, not a
//! gated BS.1770 measurement.

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use super::buffer::{peak, AudioBuffer};
use super::filters::Biquad;
use super::DspError;

/// Default loudness target (LUFS)
pub const DEFAULT_TARGET_LUFS: f64 = -16.0;

/// Peak ceiling enforced after gain is applied
pub const SAFETY_PEAK: f32 = 0.95;

/// Peak level used by the fallback path
pub const FALLBACK_PEAK: f32 = 0.9;

/// Loudness reported by the fallback path
const FALLBACK_LUFS: f64 = -60.0;

const HIGHPASS_HZ: f64 = 20.0;
const SHELF_HZ: f64 = 1681.97;
const SHELF_GAIN_DB: f64 = 4.0;
const SHELF_Q: f64 = 0.7071;
const LOUDNESS_OFFSET: f64 = -0.691;

/// Loudness score, or silence when the weighted signal has no power
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoudnessMeasurement {
    Silence,
    Lufs(f64),
}

impl LoudnessMeasurement {
    /// Numeric value; silence is negative infinity
    pub fn value(&self) -> f64 {
        match self {
            LoudnessMeasurement::Silence => f64::NEG_INFINITY,
            LoudnessMeasurement::Lufs(v) => *v,
        }
    }

    pub fn is_silence(&self) -> bool {
        matches!(self, LoudnessMeasurement::Silence)
    }
}

// -inf is not representable in JSON; silence serializes as null
impl Serialize for LoudnessMeasurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LoudnessMeasurement::Silence => serializer.serialize_none(),
            LoudnessMeasurement::Lufs(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Outcome of a normalization pass
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationResult {
    pub original_lufs: LoudnessMeasurement,
    pub target_lufs: f64,
    /// Re-measurement after gain; informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_lufs: Option<LoudnessMeasurement>,
    /// Effective gain actually applied (after any safety clamp)
    pub gain_db: f64,
    pub normalized: bool,
    /// Gain was reduced to keep the peak at the safety ceiling
    pub clamped: bool,
    pub peak: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<&'static str>,
}

impl NormalizationResult {
    pub fn fallback_used(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Loudness normalizer with a configured default target
#[derive(Debug, Clone, Copy)]
pub struct LoudnessNormalizer {
    target_lufs: f64,
}

impl LoudnessNormalizer {
    pub fn new(target_lufs: f64) -> Self {
        Self { target_lufs }
    }

    pub fn target_lufs(&self) -> f64 {
        self.target_lufs
    }

    /// Measure loudness, degrading to unweighted RMS level if weighting fails
    pub fn measure(&self, buffer: &AudioBuffer) -> LoudnessMeasurement {
        match self.try_measure(buffer) {
            Ok(measurement) => measurement,
            Err(e) => {
                warn!(error = %e, "Loudness weighting failed, using unweighted RMS level");
                let ms = mean_square(buffer.samples());
                if ms > 0.0 {
                    LoudnessMeasurement::Lufs(10.0 * ms.log10())
                } else {
                    LoudnessMeasurement::Silence
                }
            }
        }
    }

    /// Weighted measurement; errors if the weighting filters cannot run
    pub fn try_measure(&self, buffer: &AudioBuffer) -> Result<LoudnessMeasurement, DspError> {
        if buffer.is_empty() {
            return Ok(LoudnessMeasurement::Silence);
        }

        let weighted = weight(buffer)?;
        let ms = mean_square(&weighted);

        if !ms.is_finite() {
            return Err(DspError::Unstable("weighted power is not finite".into()));
        }
        if ms <= 0.0 {
            return Ok(LoudnessMeasurement::Silence);
        }

        Ok(LoudnessMeasurement::Lufs(LOUDNESS_OFFSET + 10.0 * ms.log10()))
    }

    /// Normalize to the configured target
    pub fn normalize(&self, buffer: &AudioBuffer) -> (AudioBuffer, NormalizationResult) {
        self.normalize_to(buffer, self.target_lufs)
    }

    /// Normalize to `target_lufs`, falling back to peak normalization on failure
    pub fn normalize_to(
        &self,
        buffer: &AudioBuffer,
        target_lufs: f64,
    ) -> (AudioBuffer, NormalizationResult) {
        match self.try_normalize(buffer, target_lufs) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Loudness normalization failed, falling back to peak normalization");
                peak_fallback(buffer, target_lufs)
            }
        }
    }

    fn try_normalize(
        &self,
        buffer: &AudioBuffer,
        target_lufs: f64,
    ) -> Result<(AudioBuffer, NormalizationResult), DspError> {
        let current = self.try_measure(buffer)?;

        let current_lufs = match current {
            LoudnessMeasurement::Silence => {
                debug!("Silent buffer, skipping normalization");
                return Ok((
                    buffer.clone(),
                    NormalizationResult {
                        original_lufs: current,
                        target_lufs,
                        final_lufs: None,
                        gain_db: 0.0,
                        normalized: false,
                        clamped: false,
                        peak: 0.0,
                        fallback: None,
                    },
                ));
            }
            LoudnessMeasurement::Lufs(v) => v,
        };

        let gain_db = target_lufs - current_lufs;
        let gain_linear = 10f64.powf(gain_db / 20.0);
        if !gain_linear.is_finite() {
            return Err(DspError::Unstable(format!("gain of {} dB is not finite", gain_db)));
        }

        let mut normalized = buffer.clone();
        normalized.scale(gain_linear as f32);

        let mut applied_gain_db = gain_db;
        let mut clamped = false;
        let gained_peak = normalized.peak();
        if gained_peak > SAFETY_PEAK {
            let safety = SAFETY_PEAK / gained_peak;
            normalized.scale(safety);
            applied_gain_db = gain_db + 20.0 * (safety as f64).log10();
            clamped = true;
            debug!(
                requested_gain_db = gain_db,
                applied_gain_db, "Gain reduced to keep peak at safety ceiling"
            );
        }

        let final_lufs = self.try_measure(&normalized)?;

        let result = NormalizationResult {
            original_lufs: current,
            target_lufs,
            final_lufs: Some(final_lufs),
            gain_db: applied_gain_db,
            normalized: true,
            clamped,
            peak: normalized.peak(),
            fallback: None,
        };
        Ok((normalized, result))
    }
}

impl Default for LoudnessNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_LUFS)
    }
}

fn weight(buffer: &AudioBuffer) -> Result<Vec<f32>, DspError> {
    let highpass = Biquad::butterworth_highpass(HIGHPASS_HZ, buffer.sample_rate())?;
    let shelf = Biquad::high_shelf(SHELF_HZ, SHELF_GAIN_DB, SHELF_Q, buffer.sample_rate())?;
    let filtered = highpass.filtfilt(buffer.samples())?;
    shelf.process(&filtered)
}

fn mean_square(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64
}

fn peak_fallback(buffer: &AudioBuffer, target_lufs: f64) -> (AudioBuffer, NormalizationResult) {
    let original_peak = buffer.peak();
    let mut output = buffer.clone();
    if original_peak > 0.0 && original_peak.is_finite() {
        output.scale(FALLBACK_PEAK / original_peak);
    }

    let result = NormalizationResult {
        original_lufs: LoudnessMeasurement::Lufs(FALLBACK_LUFS),
        target_lufs,
        final_lufs: None,
        gain_db: 0.0,
        normalized: false,
        clamped: false,
        peak: peak(output.samples()),
        fallback: Some("peak_normalization"),
    };
    (output, result)
}
