//! Short-time Fourier analysis and the voice-conversion spectral transform
//!
//! The transform optionally pitch-shifts the buffer (see [`super::pitch`]),
//! then scales the magnitude spectrum by three contiguous band gains and
//! resynthesizes with the original phase. Output length always equals input
//! length.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::buffer::{fit_length, AudioBuffer};
use super::pitch;
use super::DspError;

/// FFT size used by the transform
pub const N_FFT: usize = 2048;

/// Hop between analysis frames
pub const HOP_LENGTH: usize = 512;

/// Semitone shifts smaller than this are treated as zero
pub const PITCH_EPSILON: f32 = 1e-3;

/// Depth of the formant ripple, `1 + depth * sin(4π * bin / bins)`
pub const FORMANT_RIPPLE_DEPTH: f32 = 0.1;

/// Formant ripple gain for `bin` out of `bins`: two sine periods across the spectrum
pub fn formant_ripple_gain(bin: usize, bins: usize) -> f32 {
    1.0 + FORMANT_RIPPLE_DEPTH * (4.0 * std::f32::consts::PI * bin as f32 / bins as f32).sin()
}

/// Three-band magnitude multipliers (low, mid, high thirds of the spectrum)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandColoring {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandColoring {
    pub const NEUTRAL: BandColoring = BandColoring {
        low: 1.0,
        mid: 1.0,
        high: 1.0,
    };

    pub fn new(low: f32, mid: f32, high: f32) -> Self {
        Self { low, mid, high }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// Gain for `bin` out of `bins` total
    pub fn gain_for_bin(&self, bin: usize, bins: usize) -> f32 {
        if bin < bins / 3 {
            self.low
        } else if bin < 2 * bins / 3 {
            self.mid
        } else {
            self.high
        }
    }
}

impl Default for BandColoring {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// F0 extraction method tag
///
/// Only consumed as a selector; the SoVITS path scales its pitch ratio by
/// [`F0Method::factor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum F0Method {
    #[default]
    Harvest,
    Dio,
    Crepe,
    Parselmouth,
}

impl F0Method {
    pub fn factor(&self) -> f32 {
        match self {
            F0Method::Harvest => 1.0,
            F0Method::Dio => 1.1,
            F0Method::Crepe => 0.95,
            F0Method::Parselmouth => 1.05,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            F0Method::Harvest => "harvest",
            F0Method::Dio => "dio",
            F0Method::Crepe => "crepe",
            F0Method::Parselmouth => "parselmouth",
        }
    }
}

impl fmt::Display for F0Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for F0Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "harvest" => Ok(F0Method::Harvest),
            "dio" => Ok(F0Method::Dio),
            "crepe" => Ok(F0Method::Crepe),
            "parselmouth" => Ok(F0Method::Parselmouth),
            other => Err(format!(
                "unsupported f0_method '{}' (expected harvest, dio, crepe or parselmouth)",
                other
            )),
        }
    }
}

/// Parameters for one spectral transform
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParameters {
    pub pitch_semitones: f32,
    pub coloring: BandColoring,
    pub target_speaker: String,
    pub preserve_pitch: bool,
    pub f0_method: F0Method,
    /// Apply [`formant_ripple_gain`] on top of the band coloring
    pub formant_ripple: bool,
}

impl TransformParameters {
    /// Neutral parameters for `target_speaker`
    pub fn new(target_speaker: impl Into<String>) -> Self {
        Self {
            pitch_semitones: 0.0,
            coloring: BandColoring::NEUTRAL,
            target_speaker: target_speaker.into(),
            preserve_pitch: true,
            f0_method: F0Method::default(),
            formant_ripple: false,
        }
    }

    pub fn with_pitch_ratio(mut self, ratio: f32) -> Self {
        self.pitch_semitones = ratio_to_semitones(ratio);
        self
    }

    pub fn with_coloring(mut self, coloring: BandColoring) -> Self {
        self.coloring = coloring;
        self
    }

    pub fn with_preserve_pitch(mut self, preserve_pitch: bool) -> Self {
        self.preserve_pitch = preserve_pitch;
        self
    }

    pub fn with_f0_method(mut self, f0_method: F0Method) -> Self {
        self.f0_method = f0_method;
        self
    }

    pub fn with_formant_ripple(mut self, formant_ripple: bool) -> Self {
        self.formant_ripple = formant_ripple;
        self
    }

    /// Whether the spectral magnitude stage changes anything
    pub fn shapes_spectrum(&self) -> bool {
        self.formant_ripple || !self.coloring.is_neutral()
    }

    /// Shift actually applied; zero when pitch is preserved
    pub fn effective_semitones(&self) -> f32 {
        if self.preserve_pitch || self.pitch_semitones.abs() < PITCH_EPSILON {
            0.0
        } else {
            self.pitch_semitones
        }
    }
}

/// Semitones corresponding to a frequency ratio (`12 * log2(ratio)`)
pub fn ratio_to_semitones(ratio: f32) -> f32 {
    if ratio > 0.0 && ratio.is_finite() {
        12.0 * ratio.log2()
    } else {
        0.0
    }
}

/// Apply pitch shift, band coloring and formant ripple; output length equals input length
pub fn transform(buffer: &AudioBuffer, params: &TransformParameters) -> Result<AudioBuffer, DspError> {
    if buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let target_len = buffer.len();
    let semitones = params.effective_semitones();
    let mut samples = buffer.samples().to_vec();

    if semitones != 0.0 {
        samples = pitch::shift(&samples, semitones)?;
    }

    if params.shapes_spectrum() {
        let stft = Stft::new(N_FFT, HOP_LENGTH)?;
        let spectrogram = stft.analyze(&samples);
        let (mut magnitudes, phases) = spectrogram.to_polar();
        let bins = stft.bins();
        for frame in &mut magnitudes {
            for (bin, magnitude) in frame.iter_mut().enumerate() {
                let mut gain = params.coloring.gain_for_bin(bin, bins);
                if params.formant_ripple {
                    gain *= formant_ripple_gain(bin, bins);
                }
                *magnitude *= gain;
            }
        }
        samples = stft.synthesize(&Spectrogram::from_polar(&magnitudes, &phases), samples.len());
    }

    if samples.iter().any(|s| !s.is_finite()) {
        return Err(DspError::Unstable("spectral transform produced non-finite samples".into()));
    }

    debug!(
        speaker = %params.target_speaker,
        semitones,
        low = params.coloring.low,
        mid = params.coloring.mid,
        high = params.coloring.high,
        formant_ripple = params.formant_ripple,
        "Applied spectral transform"
    );

    Ok(buffer.with_samples(fit_length(samples, target_len)))
}

/// Complex STFT frames, `frames[t][bin]`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<Complex32>>,
}

impl Spectrogram {
    /// Separate into magnitude and phase
    pub fn to_polar(&self) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        let magnitudes = self
            .frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect();
        let phases = self
            .frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.arg()).collect())
            .collect();
        (magnitudes, phases)
    }

    pub fn from_polar(magnitudes: &[Vec<f32>], phases: &[Vec<f32>]) -> Self {
        let frames = magnitudes
            .iter()
            .zip(phases)
            .map(|(mags, phs)| {
                mags.iter()
                    .zip(phs)
                    .map(|(&m, &p)| Complex32::from_polar(m, p))
                    .collect()
            })
            .collect();
        Self { frames }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }
}

/// Centred STFT with a periodic Hann window
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Result<Self, DspError> {
        if n_fft < 2 || n_fft % 2 != 0 || hop_length == 0 || hop_length > n_fft {
            return Err(DspError::InvalidParameters(format!(
                "n_fft {} must be even and >= 2, hop {} in 1..=n_fft",
                n_fft, hop_length
            )));
        }
        let mut planner = FftPlanner::<f32>::new();
        Ok(Self {
            n_fft,
            hop_length,
            window: hann_window_periodic(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of non-negative frequency bins
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Forward transform of a reflect-padded signal
    pub fn analyze(&self, signal: &[f32]) -> Spectrogram {
        if signal.is_empty() {
            return Spectrogram { frames: Vec::new() };
        }

        let padded = reflect_pad_center(signal, self.n_fft / 2);
        let num_frames = 1 + (padded.len() - self.n_fft) / self.hop_length;
        let bins = self.bins();
        let mut buffer = vec![Complex32::new(0.0, 0.0); self.n_fft];

        let frames = (0..num_frames)
            .map(|t| {
                let offset = t * self.hop_length;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    *slot = Complex32::new(padded[offset + i] * self.window[i], 0.0);
                }
                self.forward.process(&mut buffer);
                buffer[..bins].to_vec()
            })
            .collect();

        Spectrogram { frames }
    }

    /// Inverse transform by weighted overlap-add, trimmed to `length` samples
    pub fn synthesize(&self, spectrogram: &Spectrogram, length: usize) -> Vec<f32> {
        let num_frames = spectrogram.num_frames();
        if num_frames == 0 {
            return vec![0.0; length];
        }

        let n = self.n_fft;
        let bins = self.bins();
        let total = n + self.hop_length * (num_frames - 1);
        let mut output = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let mut buffer = vec![Complex32::new(0.0, 0.0); n];
        let scale = 1.0 / n as f32;

        for (t, frame) in spectrogram.frames.iter().enumerate() {
            // Rebuild the Hermitian-symmetric spectrum
            for k in 0..bins {
                buffer[k] = frame.get(k).copied().unwrap_or_default();
            }
            buffer[0].im = 0.0;
            buffer[n / 2].im = 0.0;
            for k in 1..n / 2 {
                buffer[n - k] = buffer[k].conj();
            }
            self.inverse.process(&mut buffer);

            let offset = t * self.hop_length;
            for i in 0..n {
                output[offset + i] += buffer[i].re * scale * self.window[i];
                window_sum[offset + i] += self.window[i] * self.window[i];
            }
        }

        for (sample, &wss) in output.iter_mut().zip(&window_sum) {
            if wss > 1e-8 {
                *sample /= wss;
            }
        }

        let start = n / 2;
        let available = total.saturating_sub(start);
        let mut trimmed: Vec<f32> = output.into_iter().skip(start).take(length.min(available)).collect();
        trimmed.resize(length, 0.0);
        trimmed
    }
}

fn hann_window_periodic(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        .collect()
}

fn reflect_pad_center(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    if n == 1 {
        return vec![signal[0]; n + 2 * pad];
    }

    (0..n + 2 * pad)
        .map(|i| signal[reflect_index(i as isize - pad as isize, n)])
        .collect()
}

fn reflect_index(index: isize, len: usize) -> usize {
    let period = (2 * (len - 1)) as isize;
    let mut x = index.rem_euclid(period);
    if x >= len as isize {
        x = period - x;
    }
    x as usize
}
