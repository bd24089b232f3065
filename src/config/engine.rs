//! Engine tuning knobs
//!
//! Every constant the DSP stages use lives here and is threaded explicitly
//! from the pipeline entry point; nothing reads the environment.

use serde::{Deserialize, Serialize};

/// Canonical internal sample rate
pub const CANONICAL_SAMPLE_RATE: u32 = 44100;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate every buffer is resampled to on load
    pub sample_rate: u32,
    pub tempo: TempoConfig,
    pub key: KeyConfig,
    pub align: AlignConfig,
    pub mix: MixConfig,
    pub snippet: SnippetConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: CANONICAL_SAMPLE_RATE,
            tempo: TempoConfig::default(),
            key: KeyConfig::default(),
            align: AlignConfig::default(),
            mix: MixConfig::default(),
            snippet: SnippetConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject settings the stages cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".to_string());
        }
        let (lo, hi) = self.tempo.band;
        if !(lo > 0.0 && hi >= 2.0 * lo) {
            return Err(format!(
                "tempo band [{lo}, {hi}] must be positive and span at least one octave"
            ));
        }
        if self.tempo.hop == 0 || self.tempo.n_fft < self.tempo.hop {
            return Err("tempo hop must be positive and not exceed n_fft".to_string());
        }
        if self.key.hop == 0 || self.key.n_fft < self.key.hop {
            return Err("key hop must be positive and not exceed n_fft".to_string());
        }
        if self.align.hop == 0 {
            return Err("alignment hop must be positive".to_string());
        }
        if self.mix.gain_cap < self.mix.gain_floor {
            return Err(format!(
                "gain cap {} is below the gain floor {}",
                self.mix.gain_cap, self.mix.gain_floor
            ));
        }
        Ok(())
    }
}

/// Tempo estimator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Folding band (lo, hi) in BPM
    pub band: (f64, f64),
    /// Range searched by the autocorrelation and periodogram estimators
    pub search_range: (f64, f64),
    /// Onset envelope hop in samples
    pub hop: usize,
    pub n_fft: usize,
    pub n_mels: usize,
    /// Median-filter length for harmonic/percussive separation
    pub hpss_kernel: usize,
    /// Percussive mask margin
    pub hpss_margin: f32,
    pub autocorr_top_k: usize,
    pub periodogram_top_k: usize,
    /// Longest autocorrelation lag in seconds
    pub max_lag_secs: f64,
    /// Envelopes shorter than this are insufficient
    pub min_envelope_frames: usize,
    /// Envelopes whose peak is below this are insufficient
    pub min_envelope_peak: f32,
    /// Prior tempo for the dynamic-programming beat tracker
    pub start_bpm: f64,
    /// Beat tracker transition tightness
    pub tightness: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            band: (70.0, 180.0),
            search_range: (40.0, 220.0),
            hop: 256,
            n_fft: 2048,
            n_mels: 64,
            hpss_kernel: 17,
            hpss_margin: 3.0,
            autocorr_top_k: 8,
            periodogram_top_k: 6,
            max_lag_secs: 8.0,
            min_envelope_frames: 24,
            min_envelope_peak: 1e-6,
            start_bpm: 120.0,
            tightness: 100.0,
        }
    }
}

/// Key estimator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub n_fft: usize,
    pub hop: usize,
    /// Lowest frequency mapped to chroma
    pub min_freq: f32,
    /// Highest frequency mapped to chroma
    pub max_freq: f32,
    pub hpss_kernel: usize,
    /// Nearest neighbours used by the chroma noise filter (0 = automatic)
    pub filter_neighbors: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            n_fft: 8192,
            hop: 2048,
            min_freq: 65.0,
            max_freq: 5000.0,
            hpss_kernel: 17,
            filter_neighbors: 0,
        }
    }
}

/// Alignment engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub hop: usize,
    pub n_fft: usize,
    /// Only the first this-many seconds are analysed
    pub analysis_secs: f64,
    /// Anchor beats are taken from the first this-many beats
    pub max_anchor_beats: usize,
    /// Minimum beat count for the beat-anchored search
    pub min_beats: usize,
    /// z-score a vocal onset must exceed to count as strong
    pub strong_onset_z: f32,
    /// Onsets before this time are ignored when looking for a strong one
    pub onset_guard_secs: f64,
    /// How far into the vocal to look for its first strong onset
    pub max_seek_secs: f64,
    /// Score penalty per second of candidate offset
    pub late_penalty_per_sec: f64,
    /// Candidates outside this window (seconds) are discarded
    pub candidate_range: (f64, f64),
    /// Frames tested either side of the winning candidate
    pub refine_frames: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            hop: 512,
            n_fft: 2048,
            analysis_secs: 90.0,
            max_anchor_beats: 32,
            min_beats: 4,
            strong_onset_z: 2.2,
            onset_guard_secs: 0.2,
            max_seek_secs: 45.0,
            late_penalty_per_sec: 0.002,
            candidate_range: (-5.0, 90.0),
            refine_frames: 2,
        }
    }
}

/// Loudness matching and mixdown settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Target vocal level relative to the instrumental, in dB
    pub vocal_level_db: f64,
    pub gain_floor: f64,
    pub gain_cap: f64,
    pub instrumental_weight: f32,
    pub vocal_weight: f32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            vocal_level_db: -6.0,
            gain_floor: 0.5,
            gain_cap: 8.0,
            instrumental_weight: 0.92,
            vocal_weight: 1.0,
        }
    }
}

/// Snippet window and defaults for the tempo-only analysis path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    pub offset_secs: f64,
    pub duration_secs: f64,
    /// Shorter snippets are treated as unreadable
    pub min_samples: usize,
    /// Snippets whose peak is below this are treated as silent
    pub silence_peak: f32,
    pub default_bpm: f64,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            offset_secs: 0.2,
            duration_secs: 30.0,
            min_samples: 4096,
            silence_peak: 1e-4,
            default_bpm: 120.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_narrow_band_rejected() {
        let mut config = EngineConfig::default();
        config.tempo.band = (100.0, 150.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_gain_bounds_rejected() {
        let mut config = EngineConfig::default();
        config.mix.gain_cap = 0.25;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"mix": {"gain_cap": 4.0}}"#).expect("valid json");
        assert_eq!(config.mix.gain_cap, 4.0);
        assert_eq!(config.mix.vocal_level_db, -6.0);
        assert_eq!(config.tempo.band, (70.0, 180.0));
    }
}
