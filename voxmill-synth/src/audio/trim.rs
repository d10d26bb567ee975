//! Leading/trailing silence removal
//!
//! Frame energy is measured on centred, zero-padded frames. Frames whose RMS
//! lies more than `top_db` below the loudest frame count as silence. The
//! frame-level range is then tightened to the first and last samples whose
//! magnitude exceeds the same threshold, and the pass is repeated until the
//! range stops shrinking, which makes trimming idempotent.

use tracing::debug;

use super::buffer::AudioBuffer;
use super::DspError;

/// Default analysis frame length in samples
pub const DEFAULT_FRAME_LENGTH: usize = 2048;

/// Default hop between frames in samples
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Sample range kept by a trim, relative to the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimResult {
    /// First kept sample
    pub start: usize,
    /// One past the last kept sample
    pub end: usize,
    /// Input length
    pub original_len: usize,
}

impl TrimResult {
    /// Number of samples kept
    pub fn kept(&self) -> usize {
        self.end - self.start
    }

    /// Number of samples removed from both ends together
    pub fn removed(&self) -> usize {
        self.original_len - self.kept()
    }
}

/// Silence trimmer with a fixed threshold and framing
#[derive(Debug, Clone, Copy)]
pub struct SilenceTrimmer {
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
}

impl SilenceTrimmer {
    /// Trimmer with default framing
    pub fn new(top_db: f32) -> Self {
        Self {
            top_db,
            frame_length: DEFAULT_FRAME_LENGTH,
            hop_length: DEFAULT_HOP_LENGTH,
        }
    }

    /// Override frame and hop lengths
    pub fn with_framing(mut self, frame_length: usize, hop_length: usize) -> Self {
        self.frame_length = frame_length;
        self.hop_length = hop_length;
        self
    }

    pub fn top_db(&self) -> f32 {
        self.top_db
    }

    pub fn trim(&self, buffer: &AudioBuffer) -> Result<(AudioBuffer, TrimResult), DspError> {
        trim_with_bounds(buffer, self.top_db, self.frame_length, self.hop_length)
    }
}

/// Trim leading and trailing silence
pub fn trim(
    buffer: &AudioBuffer,
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
) -> Result<AudioBuffer, DspError> {
    trim_with_bounds(buffer, top_db, frame_length, hop_length).map(|(trimmed, _)| trimmed)
}

/// Trim leading and trailing silence, reporting the kept range
///
/// An all-silent (or empty) buffer yields an empty buffer at the same rate.
pub fn trim_with_bounds(
    buffer: &AudioBuffer,
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
) -> Result<(AudioBuffer, TrimResult), DspError> {
    if frame_length == 0 || hop_length == 0 {
        return Err(DspError::InvalidParameters(format!(
            "frame length {} and hop length {} must be positive",
            frame_length, hop_length
        )));
    }
    if !(top_db > 0.0 && top_db.is_finite()) {
        return Err(DspError::InvalidParameters(format!(
            "top_db must be positive, got {}",
            top_db
        )));
    }

    let samples = buffer.samples();
    let mut start = 0;
    let mut end = samples.len();

    loop {
        match trim_once(&samples[start..end], top_db, frame_length, hop_length) {
            None => {
                start = 0;
                end = 0;
                break;
            }
            Some((s, e)) if s == 0 && e == end - start => break,
            Some((s, e)) => {
                end = start + e;
                start += s;
            }
        }
    }

    let bounds = TrimResult {
        start,
        end,
        original_len: samples.len(),
    };
    debug!(
        start,
        end,
        removed = bounds.removed(),
        "Trimmed silence"
    );

    Ok((buffer.with_samples(samples[start..end].to_vec()), bounds))
}

/// One trimming pass; `None` when nothing rises above the threshold
fn trim_once(
    samples: &[f32],
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
) -> Option<(usize, usize)> {
    let n = samples.len();
    if n == 0 {
        return None;
    }

    let frame_rms = centred_frame_rms(samples, frame_length, hop_length);
    let max_rms = frame_rms.iter().cloned().fold(0.0f64, f64::max);
    if max_rms <= 0.0 {
        return None;
    }

    let threshold = max_rms * 10f64.powf(-(top_db as f64) / 20.0);
    let first = frame_rms.iter().position(|&r| r > threshold)?;
    let last = frame_rms.iter().rposition(|&r| r > threshold)?;

    let frame_start = first * hop_length;
    let frame_end = n.min((last + 1) * hop_length);
    if frame_start >= frame_end {
        return None;
    }

    let region = &samples[frame_start..frame_end];
    let above = |s: &f32| (*s as f64).abs() > threshold;
    match (region.iter().position(above), region.iter().rposition(above)) {
        (Some(lo), Some(hi)) => Some((frame_start + lo, frame_start + hi + 1)),
        _ => Some((frame_start, frame_end)),
    }
}

/// RMS of frames centred on every `hop_length`-th sample, zero padded by half a frame
fn centred_frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    let pad = frame_length / 2;
    let padded_len = samples.len() + 2 * pad;
    if padded_len < frame_length {
        return Vec::new();
    }
    let n_frames = 1 + (padded_len - frame_length) / hop_length;

    // Prefix sums of squares over the padded signal
    let mut cumulative = Vec::with_capacity(padded_len + 1);
    cumulative.push(0.0f64);
    let mut acc = 0.0f64;
    for i in 0..padded_len {
        let v = if i >= pad && i < pad + samples.len() {
            samples[i - pad] as f64
        } else {
            0.0
        };
        acc += v * v;
        cumulative.push(acc);
    }

    (0..n_frames)
        .map(|i| {
            let lo = i * hop_length;
            let hi = lo + frame_length;
            ((cumulative[hi] - cumulative[lo]).max(0.0) / frame_length as f64).sqrt()
        })
        .collect()
}
