//! Time-stretch and pitch-shift
//!
//! [`Transformer`] tries an optional external backend first and falls back
//! to the built-in [`PhaseVocoder`] on any failure. The pipeline always
//! stretches before shifting.

pub mod phase_vocoder;
pub mod planner;
pub mod rubberband;

pub use phase_vocoder::PhaseVocoder;
pub use planner::plan;
pub use rubberband::RubberBand;

use crate::error::Result;
use crate::types::{AudioBuffer, TransformPlan};
use std::sync::Arc;
use tracing::{debug, warn};

/// A time/pitch algorithm
pub trait TimePitchBackend: Send + Sync {
    /// Change duration by `1 / rate`, keeping pitch
    fn stretch(&self, buffer: &AudioBuffer, rate: f64) -> Result<AudioBuffer>;

    /// Change pitch by `semitones`, keeping duration
    fn shift(&self, buffer: &AudioBuffer, semitones: f64) -> Result<AudioBuffer>;

    /// Check if the backend can run on this host
    fn is_available(&self) -> bool;

    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;
}

/// External backend with a guaranteed built-in fallback
#[derive(Clone, Default)]
pub struct Transformer {
    external: Option<Arc<dyn TimePitchBackend>>,
    builtin: PhaseVocoder,
}

impl Transformer {
    /// Built-in phase vocoder only
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Prefer `external` when it reports available
    pub fn with_external(external: Option<Arc<dyn TimePitchBackend>>) -> Self {
        Self {
            external: external.filter(|b| b.is_available()),
            builtin: PhaseVocoder,
        }
    }

    /// Name of the backend tried first
    pub fn primary(&self) -> &'static str {
        self.external.as_ref().map_or(self.builtin.name(), |b| b.name())
    }

    /// Stretch by `rate`; non-finite or non-positive rates stretch by 1.0
    pub fn stretch(&self, buffer: &AudioBuffer, rate: f64) -> AudioBuffer {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            warn!("Invalid stretch rate {}; using 1.0", rate);
            1.0
        };
        if (rate - 1.0).abs() < 1e-9 || buffer.is_empty() {
            return buffer.clone();
        }
        self.run("stretch", buffer, |b| b.stretch(buffer, rate), || {
            phase_vocoder::time_stretch(&buffer.samples, rate)
        })
    }

    /// Shift by `semitones`; non-finite shifts are skipped
    pub fn shift(&self, buffer: &AudioBuffer, semitones: f64) -> AudioBuffer {
        if !semitones.is_finite() {
            warn!("Invalid pitch shift {}; skipping", semitones);
            return buffer.clone();
        }
        if semitones.abs() < 1e-9 || buffer.is_empty() {
            return buffer.clone();
        }
        self.run("shift", buffer, |b| b.shift(buffer, semitones), || {
            phase_vocoder::pitch_shift(&buffer.samples, semitones)
        })
    }

    /// Stretch, then shift
    pub fn apply(&self, buffer: &AudioBuffer, plan: &TransformPlan) -> AudioBuffer {
        let stretched = self.stretch(buffer, plan.rate_ratio());
        self.shift(&stretched, plan.semitone_shift())
    }

    fn run(
        &self,
        op: &str,
        buffer: &AudioBuffer,
        external: impl FnOnce(&dyn TimePitchBackend) -> Result<AudioBuffer>,
        builtin: impl FnOnce() -> Vec<f32>,
    ) -> AudioBuffer {
        if let Some(backend) = &self.external {
            match external(backend.as_ref()) {
                Ok(out) => {
                    debug!("{} via {}", op, backend.name());
                    return out;
                }
                Err(e) => warn!("{} failed, falling back to {}: {}", backend.name(), self.builtin.name(), e),
            }
        }
        AudioBuffer::new(builtin(), buffer.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StemmixError;

    struct Broken;

    impl TimePitchBackend for Broken {
        fn stretch(&self, _buffer: &AudioBuffer, _rate: f64) -> Result<AudioBuffer> {
            Err(StemmixError::upstream("broken", "crashed"))
        }
        fn shift(&self, _buffer: &AudioBuffer, _semitones: f64) -> Result<AudioBuffer> {
            Err(StemmixError::upstream("broken", "crashed"))
        }
        fn is_available(&self) -> bool {
            true
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn noise(len: usize) -> AudioBuffer {
        let samples = (0..len).map(|i| ((i * 7919) % 200) as f32 / 200.0 - 0.5).collect();
        AudioBuffer::new(samples, 44100)
    }

    #[test]
    fn test_broken_backend_falls_back() {
        let t = Transformer::with_external(Some(Arc::new(Broken)));
        assert_eq!(t.primary(), "broken");
        let out = t.stretch(&noise(44100), 0.75);
        assert_eq!(out.len(), 58800);
    }

    #[test]
    fn test_invalid_rate_is_identity() {
        let t = Transformer::builtin();
        let input = noise(1000);
        assert_eq!(t.stretch(&input, f64::NAN), input);
        assert_eq!(t.stretch(&input, -1.0), input);
        assert_eq!(t.shift(&input, f64::INFINITY), input);
    }

    #[test]
    fn test_shift_keeps_duration() {
        let t = Transformer::builtin();
        let input = noise(30000);
        assert_eq!(t.shift(&input, -4.0).len(), 30000);
    }
}
