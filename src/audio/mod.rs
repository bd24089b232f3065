//! Audio loading and writing
//!
//! The [`Loader`] tries each decode tier in order (ffmpeg subprocess, hound
//! WAV reader, symphonia) and resamples the first success to the requested
//! rate. When every tier fails it returns silence of the requested duration
//! (empty when no duration was given); loading never fails outward.

pub mod decoder;
pub mod ffmpeg;
pub mod resample;
pub mod wav;

pub use resample::resample;
pub use wav::write_wav;

use crate::error::Result;
use crate::types::AudioBuffer;
use std::path::PathBuf;
use tracing::{debug, warn};

/// What to decode
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub path: PathBuf,
    /// Target sample rate
    pub sample_rate: u32,
    /// Window start in seconds
    pub offset_secs: f64,
    /// Window length in seconds; `None` decodes to the end
    pub duration_secs: Option<f64>,
}

impl LoadRequest {
    /// The whole file
    pub fn whole(path: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            path: path.into(),
            sample_rate,
            offset_secs: 0.0,
            duration_secs: None,
        }
    }

    /// A preview window
    pub fn snippet(path: impl Into<PathBuf>, sample_rate: u32, offset_secs: f64, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            sample_rate,
            offset_secs,
            duration_secs: Some(duration_secs),
        }
    }
}

/// One way of turning a file into mono samples
///
/// Implementations may return any sample rate; the loader resamples.
pub trait DecodeTier: Send + Sync {
    /// Tier name for logging
    fn name(&self) -> &'static str;

    fn decode(&self, request: &LoadRequest) -> Result<AudioBuffer>;
}

/// Result of a load
#[derive(Debug, Clone)]
pub struct Loaded {
    /// Mono buffer at the requested rate
    pub buffer: AudioBuffer,
    /// Tier that succeeded; `None` when the buffer is the silence fallback
    pub decoded_by: Option<&'static str>,
}

impl Loaded {
    pub fn is_fallback(&self) -> bool {
        self.decoded_by.is_none()
    }
}

/// Tiered decoder
pub struct Loader {
    tiers: Vec<Box<dyn DecodeTier>>,
}

impl Loader {
    /// Loader with the given tiers, tried in order
    pub fn new(tiers: Vec<Box<dyn DecodeTier>>) -> Self {
        Self { tiers }
    }

    /// WAV reader then symphonia
    pub fn builtin() -> Self {
        Self::new(vec![Box::new(wav::WavTier), Box::new(decoder::SymphoniaTier)])
    }

    /// ffmpeg first, then the built-in tiers
    pub fn with_ffmpeg(command: impl Into<String>) -> Self {
        let mut loader = Self::builtin();
        loader.tiers.insert(0, Box::new(ffmpeg::FfmpegTier::new(command)));
        loader
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Decode a request; falls back to silence rather than failing
    pub fn load(&self, request: &LoadRequest) -> Loaded {
        for tier in &self.tiers {
            match tier.decode(request) {
                Ok(buffer) => {
                    debug!(
                        "Decoded {} with {} ({} samples @ {}Hz)",
                        request.path.display(),
                        tier.name(),
                        buffer.len(),
                        buffer.sample_rate
                    );
                    let samples = resample(&buffer.samples, buffer.sample_rate, request.sample_rate);
                    return Loaded {
                        buffer: AudioBuffer::new(samples, request.sample_rate),
                        decoded_by: Some(tier.name()),
                    };
                }
                Err(e) => {
                    debug!("Decode tier {} failed for {}: {}", tier.name(), request.path.display(), e);
                }
            }
        }

        warn!(
            "Could not decode {} with any of [{}]; substituting silence",
            request.path.display(),
            self.tier_names().join(", ")
        );
        let len = request
            .duration_secs
            .map(|d| (d.max(0.0) * request.sample_rate as f64).round() as usize)
            .unwrap_or(0);
        Loaded {
            buffer: AudioBuffer::silence(len, request.sample_rate),
            decoded_by: None,
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StemmixError;

    struct Failing;

    impl DecodeTier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn decode(&self, request: &LoadRequest) -> Result<AudioBuffer> {
            Err(StemmixError::decode_failure(&request.path, "always fails"))
        }
    }

    struct Fixed(u32);

    impl DecodeTier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn decode(&self, _request: &LoadRequest) -> Result<AudioBuffer> {
            Ok(AudioBuffer::new(vec![0.25; self.0 as usize], self.0))
        }
    }

    #[test]
    fn test_falls_through_to_next_tier() {
        let loader = Loader::new(vec![Box::new(Failing), Box::new(Fixed(22050))]);
        let loaded = loader.load(&LoadRequest::whole("x.mp3", 44100));
        assert_eq!(loaded.decoded_by, Some("fixed"));
        assert_eq!(loaded.buffer.sample_rate, 44100);
        assert_eq!(loaded.buffer.len(), 44100);
    }

    #[test]
    fn test_silence_fallback_has_requested_duration() {
        let loader = Loader::new(vec![Box::new(Failing)]);
        let loaded = loader.load(&LoadRequest::snippet("x.mp3", 44100, 0.2, 2.0));
        assert!(loaded.is_fallback());
        assert_eq!(loaded.buffer.len(), 88200);
        assert_eq!(loaded.buffer.peak(), 0.0);
    }

    #[test]
    fn test_silence_fallback_without_duration_is_empty() {
        let loaded = Loader::builtin().load(&LoadRequest::whole("/nonexistent/a.flac", 44100));
        assert!(loaded.is_fallback());
        assert!(loaded.buffer.is_empty());
    }

    #[test]
    fn test_ffmpeg_tier_is_first() {
        let loader = Loader::with_ffmpeg("ffmpeg");
        assert_eq!(loader.tier_names(), vec!["ffmpeg", "wav", "symphonia"]);
    }
}
