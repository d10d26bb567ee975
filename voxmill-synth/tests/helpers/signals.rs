//! Test signal generators

use std::f32::consts::PI;

use voxmill_synth::audio::AudioBuffer;

pub fn sine(freq: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> AudioBuffer {
    let len = (seconds * sample_rate as f32).round() as usize;
    let samples = (0..len)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect();
    AudioBuffer::new(samples, sample_rate).unwrap()
}

pub fn silence(seconds: f32, sample_rate: u32) -> AudioBuffer {
    let len = (seconds * sample_rate as f32).round() as usize;
    AudioBuffer::new(vec![0.0; len], sample_rate).unwrap()
}

/// Join buffers of the same sample rate
pub fn concat(parts: &[AudioBuffer]) -> AudioBuffer {
    let sample_rate = parts.first().map(|p| p.sample_rate()).unwrap_or(22050);
    let samples = parts
        .iter()
        .flat_map(|p| p.samples().iter().copied())
        .collect();
    AudioBuffer::new(samples, sample_rate).unwrap()
}
