//! Output-stage soft limiting and dither

use rand::Rng;

use super::buffer::AudioBuffer;

/// Peak above which the soft limiter engages
pub const LIMIT_THRESHOLD: f32 = 0.95;

/// Half-width of the uniform dither noise
pub const DITHER_AMPLITUDE: f32 = 1e-5;

/// Apply `tanh(x / peak * 0.95) * 0.95` when the peak exceeds 0.95
///
/// Returns whether the limiter engaged.
pub fn soft_limit(buffer: &mut AudioBuffer) -> bool {
    let peak = buffer.peak();
    if !(peak > LIMIT_THRESHOLD) || !peak.is_finite() {
        return false;
    }

    for sample in buffer.samples_mut() {
        *sample = (*sample / peak * LIMIT_THRESHOLD).tanh() * LIMIT_THRESHOLD;
    }
    true
}

/// Add uniform dither in `[-1e-5, 1e-5]` using the thread-local RNG
pub fn add_dither(buffer: &mut AudioBuffer) {
    add_dither_with(buffer, &mut rand::thread_rng());
}

pub fn add_dither_with<R: Rng + ?Sized>(buffer: &mut AudioBuffer, rng: &mut R) {
    for sample in buffer.samples_mut() {
        *sample += rng.gen_range(-DITHER_AMPLITUDE..=DITHER_AMPLITUDE);
    }
}
