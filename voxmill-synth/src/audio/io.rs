//! WAV encoding/decoding and base64 payload handling

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::buffer::AudioBuffer;
use super::DspError;

fn output_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Write a mono 16-bit PCM WAV file
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, output_spec(buffer.sample_rate()))?;
    for &sample in buffer.samples() {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()
}

/// Encode a buffer as an in-memory mono 16-bit PCM WAV
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, DspError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, output_spec(buffer.sample_rate()))
            .map_err(|e| DspError::Codec(e.to_string()))?;
        for &sample in buffer.samples() {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| DspError::Codec(e.to_string()))?;
        }
        writer.finalize().map_err(|e| DspError::Codec(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Decode WAV bytes (integer or float PCM, any channel count) to mono
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, DspError> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| DspError::Codec(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DspError::Codec(e.to_string()))?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DspError::Codec(e.to_string()))?
        }
    };

    AudioBuffer::new(downmix(&interleaved, spec.channels), spec.sample_rate)
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Decode a base64 payload, accepting an optional `data:<mime>;base64,` prefix
pub fn decode_base64_audio(payload: &str) -> Result<Vec<u8>, DspError> {
    let trimmed = payload.trim();
    let data = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| DspError::Codec("data URL has no payload".into()))?,
        None => trimmed,
    };
    STANDARD
        .decode(data)
        .map_err(|e| DspError::Codec(format!("invalid base64 audio: {}", e)))
}
