//! Universal decoding using symphonia
//!
//! Decodes any container/codec symphonia understands to mono f32 at the
//! source sample rate, honouring the request window. Decoding stops as soon
//! as the window end has been reached.

use super::{DecodeTier, LoadRequest};
use crate::error::{Result, StemmixError};
use crate::types::AudioBuffer;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Maximum file size we'll attempt to decode (2GB)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Tolerant last-resort decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaTier;

impl DecodeTier for SymphoniaTier {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn decode(&self, request: &LoadRequest) -> Result<AudioBuffer> {
        decode_window(&request.path, request.offset_secs, request.duration_secs)
    }
}

/// Decode `[offset, offset + duration)` of a file to mono at its native rate
pub fn decode_window(path: &Path, offset_secs: f64, duration_secs: Option<f64>) -> Result<AudioBuffer> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| StemmixError::decode_failure(path, format!("Failed to read file metadata: {}", e)))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(StemmixError::decode_failure(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| StemmixError::decode_failure(path, format!("Failed to open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| StemmixError::decode_failure(path, format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| StemmixError::decode_failure(path, "No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        sample_rate,
        channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| StemmixError::decode_failure(path, format!("Failed to create decoder: {}", e)))?;

    // Window bounds in mono frames
    let skip = (offset_secs.max(0.0) * sample_rate as f64).round() as usize;
    let take = duration_secs.map(|d| (d.max(0.0) * sample_rate as f64).round() as usize);

    let mut seen = 0usize;
    let mut samples: Vec<f32> = Vec::with_capacity(take.unwrap_or(0));

    loop {
        if take.is_some_and(|t| samples.len() >= t) {
            break;
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(StemmixError::decode_failure(
                    path,
                    format!("Failed to read packet: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(StemmixError::decode_failure(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let mono = to_mono(sample_buf.samples(), spec.channels.count().max(1));

        // Drop frames before the window start
        let start = skip.saturating_sub(seen).min(mono.len());
        seen += mono.len();
        samples.extend_from_slice(&mono[start..]);
    }

    if let Some(t) = take {
        samples.truncate(t);
    }

    debug!(
        "Decoded {} samples ({:.2}s)",
        samples.len(),
        samples.len() as f64 / sample_rate as f64
    );

    Ok(AudioBuffer::new(samples, sample_rate))
}

/// Convert interleaved multi-channel audio to mono
pub fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_stereo() {
        let stereo = vec![0.5, 0.3, 0.8, 0.2, 1.0, 0.0];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.5).abs() < 0.001);
        assert!((mono[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_to_mono_already_mono() {
        let mono = vec![0.5, 0.8, 1.0];
        assert_eq!(to_mono(&mono, 1), mono);
    }

    #[test]
    fn test_missing_file_is_decode_failure() {
        let err = decode_window(Path::new("/nonexistent/track.mp3"), 0.0, None).unwrap_err();
        assert!(matches!(err, StemmixError::DecodeFailure { .. }));
    }
}
