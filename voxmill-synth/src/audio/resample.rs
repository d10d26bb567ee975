//! Mono sample-rate conversion using rubato
//!
//! Used to bring uploaded audio to the service rate and as the second half
//! of the pitch shifter (stretch, then resample back to the original length).

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use super::buffer::fit_length;
use super::DspError;

/// Mono resampler built on rubato's polynomial interpolator
pub struct Resampler;

impl Resampler {
    /// Convert `input` from `input_rate` to `output_rate`
    ///
    /// Returns a copy when the rates already match.
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>, DspError> {
        if input_rate == 0 {
            return Err(DspError::InvalidSampleRate(input_rate));
        }
        if output_rate == 0 {
            return Err(DspError::InvalidSampleRate(output_rate));
        }
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }

        debug!(input_rate, output_rate, frames = input.len(), "Resampling");
        Self::by_ratio(input, output_rate as f64 / input_rate as f64)
    }

    /// Resample by `ratio` (output length / input length)
    ///
    /// The result is padded or truncated to `round(len * ratio)` so callers
    /// can rely on the length regardless of interpolator delay.
    pub fn by_ratio(input: &[f32], ratio: f64) -> Result<Vec<f32>, DspError> {
        if !(ratio > 0.0 && ratio.is_finite()) {
            return Err(DspError::Resample(format!("invalid ratio {}", ratio)));
        }
        let expected = (input.len() as f64 * ratio).round() as usize;
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let mut resampler = Self::create_resampler(ratio, input.len())?;
        let planar_input = vec![input.to_vec()];
        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| DspError::Resample(e.to_string()))?;

        let output = planar_output.pop().unwrap_or_default();
        Ok(fit_length(output, expected))
    }

    fn create_resampler(ratio: f64, chunk_size: usize) -> Result<FastFixedIn<f32>, DspError> {
        FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, chunk_size, 1)
            .map_err(|e| DspError::Resample(format!("Failed to create resampler: {}", e)))
    }
}
