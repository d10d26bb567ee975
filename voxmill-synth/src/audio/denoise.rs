//! Rumble filter plus envelope-driven soft noise gate

use tracing::{debug, warn};

use super::buffer::AudioBuffer;
use super::filters::Biquad;
use super::DspError;

/// High-pass corner removing rumble
pub const RUMBLE_CUTOFF_HZ: f64 = 80.0;

/// Envelope smoothing window
pub const ENVELOPE_WINDOW_SECONDS: f64 = 0.02;

/// Envelope percentile taken as the noise floor
pub const NOISE_FLOOR_PERCENTILE: f64 = 20.0;

/// Denoise, returning the input unchanged if any stage fails
pub fn denoise(buffer: &AudioBuffer) -> AudioBuffer {
    match try_denoise(buffer) {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "Denoise failed, keeping unmodified audio");
            buffer.clone()
        }
    }
}

/// High-pass at 80 Hz, then scale each sample by `sqrt(clamp((env - floor) / floor, 0, 1))`
///
/// A zero noise floor leaves the filtered signal ungated.
pub fn try_denoise(buffer: &AudioBuffer) -> Result<AudioBuffer, DspError> {
    if buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let highpass = Biquad::butterworth_highpass(RUMBLE_CUTOFF_HZ, buffer.sample_rate())?;
    let mut filtered = highpass.filtfilt(buffer.samples())?;

    let window = ((ENVELOPE_WINDOW_SECONDS * buffer.sample_rate() as f64) as usize).max(1);
    let envelope = moving_average_abs(&filtered, window);
    let floor = percentile(&envelope, NOISE_FLOOR_PERCENTILE);

    if floor <= 0.0 {
        debug!("Noise floor is zero, gate bypassed");
        return Ok(buffer.with_samples(filtered));
    }

    apply_gate(&mut filtered, &envelope, floor);

    debug!(noise_floor = floor, window, "Applied noise gate");
    Ok(buffer.with_samples(filtered))
}

/// Gain for one envelope value; `floor` must be positive
fn gate_gain(env: f64, floor: f64) -> f64 {
    ((env - floor) / floor).clamp(0.0, 1.0).sqrt()
}

fn apply_gate(samples: &mut [f32], envelope: &[f64], floor: f64) {
    for (sample, &env) in samples.iter_mut().zip(envelope) {
        *sample *= gate_gain(env, floor) as f32;
    }
}

/// Centred moving average of `|x|`, zero beyond the edges, same length as input
fn moving_average_abs(samples: &[f32], window: usize) -> Vec<f64> {
    let n = samples.len();
    let mut cumulative = Vec::with_capacity(n + 1);
    cumulative.push(0.0f64);
    let mut acc = 0.0;
    for &s in samples {
        acc += (s as f64).abs();
        cumulative.push(acc);
    }

    let ahead = (window - 1) / 2;
    let behind = window - 1 - ahead;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(behind);
            let hi = (i + ahead + 1).min(n);
            (cumulative[hi] - cumulative[lo]) / window as f64
        })
        .collect()
}

/// Percentile with linear interpolation between closest ranks
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
