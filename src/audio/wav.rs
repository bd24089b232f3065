//! WAV reading and writing with hound
//!
//! The reader is the middle decode tier: plain PCM/float WAV files, seeked
//! directly to the window start and resampled by the loader.

use super::decoder::to_mono;
use super::{DecodeTier, LoadRequest};
use crate::error::{Result, StemmixError};
use crate::types::AudioBuffer;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct WavTier;

impl DecodeTier for WavTier {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, request: &LoadRequest) -> Result<AudioBuffer> {
        read_wav_window(&request.path, request.offset_secs, request.duration_secs)
    }
}

/// Read `[offset, offset + duration)` of a WAV file as mono at its native rate
pub fn read_wav_window(path: &Path, offset_secs: f64, duration_secs: Option<f64>) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path)
        .map_err(|e| StemmixError::decode_failure(path, format!("Not a readable WAV file: {}", e)))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let total_frames = reader.duration();

    let start = ((offset_secs.max(0.0) * spec.sample_rate as f64).round() as u64)
        .min(total_frames as u64) as u32;
    reader
        .seek(start)
        .map_err(|e| StemmixError::decode_failure(path, format!("Seek failed: {}", e)))?;

    let remaining = (total_frames - start) as usize;
    let frames = duration_secs
        .map(|d| ((d.max(0.0) * spec.sample_rate as f64).round() as usize).min(remaining))
        .unwrap_or(remaining);
    let wanted = frames * channels;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .take(wanted)
            .collect::<std::result::Result<_, _>>(),
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .take(wanted)
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
        }
    }
    .map_err(|e| StemmixError::decode_failure(path, format!("Corrupt sample data: {}", e)))?;

    debug!(
        "Read {} frames from WAV {} @ {}Hz",
        interleaved.len() / channels,
        path.display(),
        spec.sample_rate
    );

    Ok(AudioBuffer::new(to_mono(&interleaved, channels), spec.sample_rate))
}

/// Write a buffer as 32-bit float mono WAV
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
pub fn write_wav(buffer: &AudioBuffer, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("wav.tmp");

    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let write = || -> std::result::Result<(), hound::Error> {
        let mut writer = WavWriter::create(&temp_path, spec)?;
        for &sample in &buffer.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    };

    write().map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        match e {
            hound::Error::IoError(io) => StemmixError::output_error(output_path, io),
            other => StemmixError::OutputError {
                path: output_path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemmixError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    debug!(
        "Wrote {:.1}s of audio to {}",
        buffer.duration(),
        output_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_int_stereo(path: &Path, sample_rate: u32, frames: usize) {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = (i % 100) as i16 * 100;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_window_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.wav");
        write_int_stereo(&path, 1000, 5000);

        let buffer = read_wav_window(&path, 1.0, Some(2.0)).unwrap();
        assert_eq!(buffer.sample_rate, 1000);
        assert_eq!(buffer.len(), 2000);
        // Frame 1000 holds (1000 % 100) * 100 = 0, frame 1001 holds 100
        assert!((buffer.samples[1] - 100.0 / 32768.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_past_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.wav");
        write_int_stereo(&path, 1000, 500);
        let buffer = read_wav_window(&path, 10.0, Some(2.0)).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_write_float_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = AudioBuffer::new(vec![0.0, 0.5, -0.25], 44100);
        write_wav(&buffer, &path).unwrap();

        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);
        assert_eq!(reader.spec().sample_rate, 44100);
        let read = read_wav_window(&path, 0.0, None).unwrap();
        assert_eq!(read.samples, buffer.samples);
        assert!(!path.with_extension("wav.tmp").exists());
    }

    #[test]
    fn test_write_to_missing_dir() {
        let buffer = AudioBuffer::new(vec![0.0; 10], 44100);
        let err = write_wav(&buffer, Path::new("/nonexistent/dir/out.wav")).unwrap_err();
        assert!(matches!(err, StemmixError::OutputError { .. }));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_is_quiet_at_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratch.wav");
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            write_wav(&AudioBuffer::silence(4410, 44100), &path).unwrap();
        });
        assert!(path.exists());
        assert!(captured.0.lock().unwrap().is_empty());
    }
}
