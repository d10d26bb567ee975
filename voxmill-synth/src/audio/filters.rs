//! Second-order IIR sections used by the loudness weighting and the denoiser
//!
//! Coefficients follow the bilinear-transform "cookbook" forms; a high-pass
//! with Q = 1/sqrt(2) is the 2nd-order Butterworth response.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use super::DspError;

/// Normalized biquad coefficients (a0 == 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// 2nd-order Butterworth high-pass
    pub fn butterworth_highpass(cutoff_hz: f64, sample_rate: u32) -> Result<Self, DspError> {
        let w0 = Self::angular_frequency(cutoff_hz, sample_rate)?;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * FRAC_1_SQRT_2);

        let a0 = 1.0 + alpha;
        Ok(Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// High-shelf boost/cut of `gain_db` above `corner_hz`
    pub fn high_shelf(
        corner_hz: f64,
        gain_db: f64,
        q: f64,
        sample_rate: u32,
    ) -> Result<Self, DspError> {
        if q <= 0.0 {
            return Err(DspError::FilterDesign(format!("Q must be positive, got {}", q)));
        }
        let w0 = Self::angular_frequency(corner_hz, sample_rate)?;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let a = 10f64.powf(gain_db / 40.0);
        let alpha = sin_w0 / (2.0 * q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Ok(Self {
            b0: a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha) / a0,
            b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
            a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        })
    }

    fn angular_frequency(freq_hz: f64, sample_rate: u32) -> Result<f64, DspError> {
        if sample_rate == 0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let nyquist = sample_rate as f64 / 2.0;
        if !(freq_hz > 0.0 && freq_hz < nyquist) {
            return Err(DspError::FilterDesign(format!(
                "corner frequency {} Hz outside (0, {}) Hz",
                freq_hz, nyquist
            )));
        }
        Ok(2.0 * PI * freq_hz / sample_rate as f64)
    }

    /// Causal filtering (transposed direct form II, zero initial state)
    pub fn process(&self, input: &[f32]) -> Result<Vec<f32>, DspError> {
        let output = self.run(input.iter().map(|&s| s as f64), [0.0, 0.0]);
        finite_or_unstable(output)
    }

    /// Zero-phase forward-backward filtering with odd-extension edge padding
    pub fn filtfilt(&self, input: &[f32]) -> Result<Vec<f32>, DspError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let n = input.len();
        let pad = (3 * 3).min(n - 1);
        let first = input[0] as f64;
        let last = input[n - 1] as f64;

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - input[i] as f64));
        extended.extend(input.iter().map(|&s| s as f64));
        extended.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i] as f64));

        let zi = self.steady_state();

        let x0 = extended[0];
        let mut forward = self.run(extended.into_iter(), [zi[0] * x0, zi[1] * x0]);
        forward.reverse();

        let y0 = forward[0];
        let mut backward = self.run(forward.into_iter(), [zi[0] * y0, zi[1] * y0]);
        backward.reverse();

        let output: Vec<f64> = backward[pad..pad + n].to_vec();
        finite_or_unstable(output)
    }

    /// Filter state after a unit step has settled
    fn steady_state(&self) -> [f64; 2] {
        let dc_gain = (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2);
        let z2 = self.b2 - self.a2 * dc_gain;
        let z1 = self.b1 - self.a1 * dc_gain + z2;
        [z1, z2]
    }

    fn run(&self, input: impl Iterator<Item = f64>, state: [f64; 2]) -> Vec<f64> {
        let [mut z1, mut z2] = state;
        input
            .map(|x| {
                let y = self.b0 * x + z1;
                z1 = self.b1 * x - self.a1 * y + z2;
                z2 = self.b2 * x - self.a2 * y;
                y
            })
            .collect()
    }
}

fn finite_or_unstable(samples: Vec<f64>) -> Result<Vec<f32>, DspError> {
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(DspError::Unstable("filter produced non-finite samples".into()));
    }
    Ok(samples.into_iter().map(|s| s as f32).collect())
}
