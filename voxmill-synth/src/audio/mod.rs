//! Audio post-processing building blocks
//!
//! Every stage operates on a mono [`AudioBuffer`] and, apart from
//! [`trim`], preserves the sample count.

pub mod buffer;
pub mod denoise;
pub mod filters;
pub mod io;
pub mod limiter;
pub mod loudness;
pub mod pitch;
pub mod resample;
pub mod spectral;
pub mod trim;

pub use buffer::AudioBuffer;
pub use denoise::denoise;
pub use limiter::{add_dither, soft_limit};
pub use loudness::{LoudnessMeasurement, LoudnessNormalizer, NormalizationResult};
pub use spectral::{transform, BandColoring, F0Method, TransformParameters};
pub use trim::{trim, TrimResult};

use thiserror::Error;

/// DSP stage errors
#[derive(Debug, Error)]
pub enum DspError {
    /// Sample rate of zero
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Stage parameter out of range
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Filter cannot be designed for this sample rate
    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    /// Filter or transform produced non-finite output
    #[error("Unstable output: {0}")]
    Unstable(String),

    /// Sample rate conversion failed
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// WAV decode/encode failure
    #[error("Audio codec error: {0}")]
    Codec(String),
}
