//! Core data types for stemmix
//!
//! These types represent the domain model and flow through the remix pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs, // C#/Db
    D,
    Ds, // D#/Eb
    E,
    F,
    Fs, // F#/Gb
    G,
    Gs, // G#/Ab
    A,
    As, // A#/Bb
    B,
}

impl PitchClass {
    /// All pitch classes in index order
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Convert from numeric index, wrapping modulo 12 (0 = C, 1 = C#, ..., 11 = B)
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    /// Convert to numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Display name, sharps for C#/F# and flats elsewhere ("Eb", "Ab", "Bb")
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "Eb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "Ab",
            PitchClass::A => "A",
            PitchClass::As => "Bb",
            PitchClass::B => "B",
        }
    }
}

/// Major or Minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

// =============================================================================
// Audio buffer
// =============================================================================

/// Owned mono floating-point PCM at a known sample rate
///
/// Every stage returns a new buffer; nothing mutates a buffer it did not
/// create.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A buffer of `len` zeros
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (0 for an invalid sample rate)
    pub fn duration(&self) -> f64 {
        if self.sample_rate > 0 {
            self.samples.len() as f64 / self.sample_rate as f64
        } else {
            0.0
        }
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()))
    }

    /// Root-mean-square level
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    /// Copy scaled so the peak is 1.0 (silence is returned unchanged)
    pub fn peak_normalized(&self) -> Self {
        let peak = self.peak();
        if peak <= f32::EPSILON {
            return self.clone();
        }
        Self::new(self.samples.iter().map(|s| s / peak).collect(), self.sample_rate)
    }
}

/// Root-mean-square of a sample slice (0 for an empty slice)
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

// =============================================================================
// Estimates
// =============================================================================

/// Source tag of a tempo candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoMethod {
    /// Optional external beat tracker (neural/statistical)
    ExternalTracker,
    /// Autocorrelation of the onset envelope
    Autocorrelation,
    /// Magnitude spectrum of the onset envelope
    Periodogram,
    /// Tempo reported by the dynamic-programming beat tracker
    BeatTrack,
    /// Median inter-beat interval of the dynamic-programming beats
    IbiMedian,
}

impl TempoMethod {
    pub fn tag(self) -> &'static str {
        match self {
            TempoMethod::ExternalTracker => "external_tracker",
            TempoMethod::Autocorrelation => "autocorr",
            TempoMethod::Periodogram => "periodogram",
            TempoMethod::BeatTrack => "beat_track",
            TempoMethod::IbiMedian => "ibi_median",
        }
    }
}

/// Fused tempo estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Winning tempo, folded into the configured band (0 when insufficient)
    pub bpm: f64,
    /// Margin-based confidence in [0.05, 0.99], 0 when insufficient
    pub confidence: f64,
    /// Folded half-tempo neighbour
    pub alt_half: f64,
    /// Folded double-tempo neighbour
    pub alt_double: f64,
    /// Estimators that contributed to the winning bin
    pub methods: BTreeSet<TempoMethod>,
    /// Distinct voting-bin centres, ascending
    pub candidates: Vec<f64>,
}

impl TempoEstimate {
    /// Result for an envelope too short or too quiet to estimate from
    pub fn insufficient() -> Self {
        Self {
            bpm: 0.0,
            confidence: 0.0,
            alt_half: 0.0,
            alt_double: 0.0,
            methods: BTreeSet::new(),
            candidates: Vec::new(),
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.bpm.is_finite() && self.bpm > 0.0
    }
}

/// Best-match musical key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEstimate {
    pub tonic: PitchClass,
    pub mode: Mode,
    /// Human readable label, e.g. "Eb minor"
    pub label: String,
}

impl KeyEstimate {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Self {
            tonic,
            mode,
            label: format!("{} {}", tonic.name(), mode.name()),
        }
    }

    pub fn is_major(&self) -> bool {
        self.mode == Mode::Major
    }

    /// Tonic as a pitch-class integer in [0, 11]
    pub fn tonic_index(&self) -> usize {
        self.tonic.to_index()
    }
}

impl Default for KeyEstimate {
    fn default() -> Self {
        Self::new(PitchClass::C, Mode::Major)
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Tempo ratio and semitone shift aligning the vocal to the instrumental
///
/// Only the planner constructs plans, so the bounds always hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    rate_ratio: f64,
    semitone_shift: f64,
}

impl TransformPlan {
    pub(crate) fn new(rate_ratio: f64, semitone_shift: f64) -> Self {
        Self {
            rate_ratio,
            semitone_shift,
        }
    }

    /// Playback-rate ratio in [0.5, 2.0] (duration scales by 1 / ratio)
    pub fn rate_ratio(&self) -> f64 {
        self.rate_ratio
    }

    /// Signed pitch shift in semitones, in [-6, 6]
    pub fn semitone_shift(&self) -> f64 {
        self.semitone_shift
    }
}

/// Which alignment algorithm produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMethod {
    /// Beat-anchored candidate search
    BeatAnchored,
    /// Global onset cross-correlation
    GlobalCorrelation,
    /// Envelopes too short to correlate; only length matching applied
    Passthrough,
}

/// Outcome of aligning the vocal against the instrumental
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Shift applied to the vocal in seconds (positive = delayed)
    pub offset_seconds: f64,
    /// Correlation of the onset envelopes after the shift, in [-1, 1]
    pub score: f64,
    pub method: AlignMethod,
}

// =============================================================================
// Results returned to collaborators
// =============================================================================

/// Immutable record of one remix operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemixResult {
    pub vocal_bpm: f64,
    pub inst_bpm: f64,
    pub vocal_key: String,
    pub inst_key: String,
    pub semitone_shift: f64,
    pub applied_rate_ratio: f64,
    pub sample_rate: u32,
    pub alignment: AlignmentResult,
    /// Linear gain applied to the aligned vocal
    pub vocal_gain: f64,
    pub duration_seconds: f64,
    /// Written output file, when the mix was persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

/// Tempo-only analysis of a single file; never an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoAnalysis {
    pub bpm: f64,
    pub confidence: f64,
    pub alt_bpms: Vec<f64>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TempoAnalysis {
    /// Degraded default result with an explanatory note
    pub fn degraded(default_bpm: f64, note: impl Into<String>) -> Self {
        Self {
            bpm: default_bpm,
            confidence: 0.0,
            alt_bpms: Vec::new(),
            key: "Unknown".to_string(),
            methods: Vec::new(),
            candidates: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Stem files produced by the separation collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StemSet {
    /// Directory holding the stems
    pub directory: PathBuf,
    /// Isolated vocal track
    pub vocals: Option<PathBuf>,
    /// Ready-made instrumental ("no_vocals"/"accompaniment")
    pub instrumental: Option<PathBuf>,
    /// Remaining named stems (bass, drums, other) for four-stem mode
    pub parts: Vec<PathBuf>,
}
