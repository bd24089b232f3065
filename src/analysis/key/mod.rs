//! Key detection
//!
//! Harmonic component → tuning estimate → chroma → nearest-neighbour
//! filtering → time-median profile, scored against Krumhansl-Kessler
//! major/minor templates rotated through all twelve tonics.

pub mod chroma;

use crate::config::KeyConfig;
use crate::dsp::hpss::hpss;
use crate::dsp::stft::stft;
use crate::types::{AudioBuffer, KeyEstimate, Mode, PitchClass};
use chroma::BandSpectrogram;
use tracing::debug;

/// Krumhansl-Kessler major profile, tonic first
pub const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor profile, tonic first
pub const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Dot product of a chroma profile with `template` rotated to `tonic`
pub fn template_score(profile: &[f64; 12], template: &[f64; 12], tonic: usize) -> f64 {
    (0..12)
        .map(|pc| profile[pc] * template[(pc + 12 - tonic % 12) % 12])
        .sum()
}

/// Best (tonic, mode) for a profile
///
/// Candidates are visited C major, C minor, C# major, ...; the first
/// strict maximum wins, so an all-zero profile yields C major.
pub fn best_key(profile: &[f64; 12]) -> KeyEstimate {
    let mut best = (0usize, Mode::Major, f64::NEG_INFINITY);
    for tonic in 0..12 {
        for (mode, template) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
            let score = template_score(profile, template, tonic);
            if score > best.2 {
                best = (tonic, mode, score);
            }
        }
    }
    KeyEstimate::new(PitchClass::from_index(best.0), best.1)
}

/// Chroma-template key estimator
#[derive(Debug, Clone, Default)]
pub struct KeyEstimator {
    config: KeyConfig,
}

impl KeyEstimator {
    pub fn new(config: KeyConfig) -> Self {
        Self { config }
    }

    /// Estimate the key of a buffer (best match, no confidence)
    pub fn estimate(&self, buffer: &AudioBuffer) -> KeyEstimate {
        let profile = self.profile(buffer);
        let key = best_key(&profile);
        if profile.iter().all(|&v| v == 0.0) {
            debug!("Empty chroma profile; defaulting to {}", key);
        } else {
            debug!("Key: {}", key);
        }
        key
    }

    /// Median chroma profile of the harmonic component
    pub fn profile(&self, buffer: &AudioBuffer) -> [f64; 12] {
        let c = &self.config;
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return [0.0; 12];
        }

        let spec = stft(&buffer.samples, c.n_fft, c.hop);
        let hz_per_bin = buffer.sample_rate as f32 / c.n_fft as f32;
        let first_bin = ((c.min_freq / hz_per_bin).ceil() as usize).max(1);
        let last_bin = ((c.max_freq / hz_per_bin).floor() as usize).min(spec.num_bins() - 1);
        if first_bin > last_bin {
            return [0.0; 12];
        }

        let band: Vec<Vec<f32>> = spec
            .magnitudes()
            .into_iter()
            .map(|frame| frame[first_bin..=last_bin].to_vec())
            .collect();
        let harmonic = hpss(&band, c.hpss_kernel, 1.0, 1.0).harmonic;

        let band_spec = BandSpectrogram {
            frames: harmonic,
            first_bin,
            n_fft: c.n_fft,
            sample_rate: buffer.sample_rate,
        };
        let tuning = chroma::estimate_tuning(&band_spec);
        debug!("Estimated tuning: {:+.2} semitones", tuning);

        let frames = chroma::chromagram(&band_spec, tuning);
        let filtered = chroma::nn_filter(&frames, c.filter_neighbors);
        chroma::profile(&filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(freqs: &[f32], secs: f32, sample_rate: u32) -> AudioBuffer {
        use std::f32::consts::PI;
        let n = (secs * sample_rate as f32) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
            })
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_template_rotation() {
        let mut profile = [0.0; 12];
        profile[2] = 1.0;
        // D is the tonic of D major
        assert_eq!(template_score(&profile, &MAJOR_PROFILE, 2), MAJOR_PROFILE[0]);
        // and the second degree of C major
        assert_eq!(template_score(&profile, &MAJOR_PROFILE, 0), MAJOR_PROFILE[2]);
    }

    #[test]
    fn test_zero_profile_is_c_major() {
        let key = best_key(&[0.0; 12]);
        assert_eq!(key.tonic, PitchClass::C);
        assert_eq!(key.mode, Mode::Major);
    }

    #[test]
    fn test_template_profile_recovers_key() {
        // A profile shaped like the F# minor template
        let mut profile = [0.0; 12];
        for pc in 0..12 {
            profile[pc] = MINOR_PROFILE[(pc + 12 - 6) % 12];
        }
        let key = best_key(&profile);
        assert_eq!(key.label, "F# minor");
    }

    #[test]
    fn test_c_major_chord() {
        let buffer = chord(&[130.81, 261.63, 329.63, 392.0], 3.0, 44100);
        let key = KeyEstimator::default().estimate(&buffer);
        assert_eq!(key.label, "C major");
    }

    #[test]
    fn test_silence_defaults_to_c_major() {
        let key = KeyEstimator::default().estimate(&AudioBuffer::silence(44100, 44100));
        assert_eq!(key, KeyEstimate::default());
    }
}
