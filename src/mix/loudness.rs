//! Relative loudness matching

use crate::config::MixConfig;
use crate::types::{rms, AudioBuffer};
use tracing::debug;

/// RMS below this is treated as silence
const NEGLIGIBLE_RMS: f64 = 1e-9;

/// Rescale `vocal` to sit `config.vocal_level_db` relative to `inst`
///
/// RMS is measured over the overlapping region. The gain is clamped to
/// `[gain_floor, gain_cap]`. A negligible RMS on either side returns the
/// vocal unchanged with unit gain.
pub fn match_loudness(vocal: &AudioBuffer, inst: &AudioBuffer, config: &MixConfig) -> (AudioBuffer, f64) {
    let overlap = vocal.len().min(inst.len());
    let rv = rms(&vocal.samples[..overlap]) as f64;
    let ri = rms(&inst.samples[..overlap]) as f64;
    if rv <= NEGLIGIBLE_RMS || ri <= NEGLIGIBLE_RMS {
        debug!("Negligible RMS (vocal {:.2e}, instrumental {:.2e}); gain unchanged", rv, ri);
        return (vocal.clone(), 1.0);
    }

    let desired = (ri / rv) * 10f64.powf(config.vocal_level_db / 20.0);
    let gain = desired.clamp(config.gain_floor, config.gain_cap);
    if gain != desired {
        debug!("Vocal gain {:.3} clamped to {:.3}", desired, gain);
    }

    let g = gain as f32;
    let scaled = AudioBuffer::new(vocal.samples.iter().map(|s| s * g).collect(), vocal.sample_rate);
    (scaled, gain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: f32, len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| amplitude * (i as f32 * 0.05).sin())
            .collect();
        AudioBuffer::new(samples, 44100)
    }

    #[test]
    fn test_target_difference() {
        let inst = tone(0.5, 44100);
        let vocal = tone(0.5, 44100);
        let (out, gain) = match_loudness(&vocal, &inst, &MixConfig::default());
        // -6 dB below an equal-level instrumental
        assert!((gain - 10f64.powf(-6.0 / 20.0)).abs() < 1e-6);
        let diff_db = 20.0 * (out.rms() as f64 / inst.rms() as f64).log10();
        assert!((diff_db + 6.0).abs() < 0.01);
    }

    #[test]
    fn test_quiet_vocal_hits_cap() {
        let inst = tone(0.5, 44100);
        // 40 dB quieter
        let vocal = tone(0.005, 44100);
        let (_, gain) = match_loudness(&vocal, &inst, &MixConfig::default());
        assert_eq!(gain, 8.0);
    }

    #[test]
    fn test_loud_vocal_hits_floor() {
        let inst = tone(0.01, 44100);
        let vocal = tone(0.9, 44100);
        let (_, gain) = match_loudness(&vocal, &inst, &MixConfig::default());
        assert_eq!(gain, 0.5);
    }

    #[test]
    fn test_silence_unchanged() {
        let inst = tone(0.5, 1000);
        let vocal = AudioBuffer::silence(1000, 44100);
        let (out, gain) = match_loudness(&vocal, &inst, &MixConfig::default());
        assert_eq!(gain, 1.0);
        assert_eq!(out, vocal);
    }
}
