//! Pitch shifting by phase-vocoder time stretch followed by resampling
//!
//! Stretching by `ratio = 2^(semitones/12)` and then resampling by
//! `1/ratio` moves every partial along the frequency axis while keeping
//! the duration.

use std::f32::consts::PI;

use rustfft::num_complex::Complex32;

use super::buffer::fit_length;
use super::resample::Resampler;
use super::spectral::{Spectrogram, Stft, HOP_LENGTH, N_FFT};
use super::DspError;

/// Buffers shorter than one analysis window are returned unshifted
pub const MIN_SHIFT_SAMPLES: usize = N_FFT;

/// Shift pitch by `semitones`; output has the input's length
pub fn shift(samples: &[f32], semitones: f32) -> Result<Vec<f32>, DspError> {
    if !semitones.is_finite() {
        return Err(DspError::InvalidParameters(format!(
            "pitch shift of {} semitones",
            semitones
        )));
    }
    if semitones == 0.0 || samples.len() < MIN_SHIFT_SAMPLES {
        return Ok(samples.to_vec());
    }

    let ratio = 2f64.powf(semitones as f64 / 12.0);
    let stretched = time_stretch(samples, ratio)?;
    let shifted = Resampler::by_ratio(&stretched, 1.0 / ratio)?;
    Ok(fit_length(shifted, samples.len()))
}

/// Lengthen (`ratio > 1`) or shorten the signal without changing its pitch
pub fn time_stretch(samples: &[f32], ratio: f64) -> Result<Vec<f32>, DspError> {
    if !(ratio > 0.0 && ratio.is_finite()) {
        return Err(DspError::InvalidParameters(format!("stretch ratio {}", ratio)));
    }

    let stft = Stft::new(N_FFT, HOP_LENGTH)?;
    let spectrogram = stft.analyze(samples);
    let stretched = phase_vocoder(&spectrogram, 1.0 / ratio, stft.n_fft(), stft.hop_length());
    let length = (samples.len() as f64 * ratio).round() as usize;
    Ok(stft.synthesize(&stretched, length))
}

/// Resample STFT frames in time at `rate` (frames advanced per output frame)
fn phase_vocoder(spectrogram: &Spectrogram, rate: f64, n_fft: usize, hop_length: usize) -> Spectrogram {
    let input = &spectrogram.frames;
    if input.is_empty() {
        return Spectrogram { frames: Vec::new() };
    }
    let bins = input[0].len();
    let silent = vec![Complex32::new(0.0, 0.0); bins];

    // Expected phase advance per hop for each bin
    let phase_advance: Vec<f32> = (0..bins)
        .map(|k| 2.0 * PI * hop_length as f32 * k as f32 / n_fft as f32)
        .collect();
    let mut phase: Vec<f32> = input[0].iter().map(|c| c.arg()).collect();

    let mut frames = Vec::new();
    let mut step = 0.0f64;
    while step < input.len() as f64 {
        let index = step.floor() as usize;
        let alpha = (step - index as f64) as f32;
        let current = &input[index];
        let next = input.get(index + 1).unwrap_or(&silent);

        let frame = (0..bins)
            .map(|k| {
                let magnitude = (1.0 - alpha) * current[k].norm() + alpha * next[k].norm();
                Complex32::from_polar(magnitude, phase[k])
            })
            .collect();
        frames.push(frame);

        for k in 0..bins {
            let mut delta = next[k].arg() - current[k].arg() - phase_advance[k];
            delta -= 2.0 * PI * (delta / (2.0 * PI)).round();
            phase[k] += phase_advance[k] + delta;
        }

        step += rate;
    }

    Spectrogram { frames }
}
