//! Multi-method tempo estimation
//!
//! A percussive-biased onset envelope feeds several independent estimators.
//! Each emits BPM candidates with a prior weight:
//!
//! | Source | Weight |
//! |---|---|
//! | external beat tracker | 2.0 |
//! | autocorrelation peaks | 1.0 + 0.8 * relative magnitude |
//! | periodogram peaks | 1.15 + 0.7 * relative magnitude |
//! | beat-tracker tempo, median inter-beat interval | 1.05 each |
//!
//! Every candidate is folded into the configured band before voting
//! (see [`voting`]).

pub mod candidates;
pub mod voting;

use super::beat::{ibi_tempo, track_beats, TrackerParams};
use super::traits::BeatTracker;
use crate::config::TempoConfig;
use crate::dsp::{onset_envelope, OnsetParams};
use crate::types::{AudioBuffer, TempoEstimate, TempoMethod};
use std::sync::Arc;
use tracing::{debug, warn};
use voting::{Candidate, VotingBins};

const EXTERNAL_WEIGHT: f64 = 2.0;
const BEAT_TRACK_WEIGHT: f64 = 1.05;

/// Resolve octave ambiguity by halving/doubling into `[lo, hi]`
///
/// Non-finite or non-positive input folds to 0.
pub fn fold_bpm(bpm: f64, lo: f64, hi: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 0.0;
    }
    let mut bpm = bpm;
    while bpm > hi {
        bpm /= 2.0;
    }
    while bpm < lo {
        bpm *= 2.0;
    }
    bpm
}

/// Tempo estimator with an optional external tracker
#[derive(Clone)]
pub struct TempoEstimator {
    config: TempoConfig,
    external: Option<Arc<dyn BeatTracker>>,
}

impl TempoEstimator {
    pub fn new(config: TempoConfig) -> Self {
        Self {
            config,
            external: None,
        }
    }

    /// Add an external tracker as the highest-weight candidate source
    pub fn with_external(mut self, tracker: Option<Arc<dyn BeatTracker>>) -> Self {
        self.external = tracker.filter(|t| t.is_available());
        self
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    fn fold(&self, bpm: f64) -> f64 {
        let (lo, hi) = self.config.band;
        fold_bpm(bpm, lo, hi)
    }

    fn onset_params(&self) -> OnsetParams {
        OnsetParams {
            n_fft: self.config.n_fft,
            hop: self.config.hop,
            n_mels: self.config.n_mels,
            percussive: Some((self.config.hpss_kernel, self.config.hpss_margin)),
        }
    }

    fn tracker_params(&self) -> TrackerParams {
        TrackerParams {
            start_bpm: self.config.start_bpm,
            tightness: self.config.tightness,
        }
    }

    /// Estimate the tempo of a buffer
    ///
    /// Returns [`TempoEstimate::insufficient`] for an envelope that is too
    /// short or near-silent.
    pub fn estimate(&self, buffer: &AudioBuffer) -> TempoEstimate {
        let normalized = buffer.peak_normalized();
        let envelope = onset_envelope(&normalized.samples, buffer.sample_rate, &self.onset_params());

        let env_peak = envelope.iter().fold(0.0f32, |m, &v| m.max(v));
        if envelope.len() < self.config.min_envelope_frames || env_peak < self.config.min_envelope_peak {
            debug!(
                "Insufficient onset envelope ({} frames, peak {:.2e})",
                envelope.len(),
                env_peak
            );
            return TempoEstimate::insufficient();
        }

        let mut bins = VotingBins::new();
        bins.extend(self.external_candidate(&normalized));
        bins.extend(self.envelope_candidates(&envelope, buffer.sample_rate));

        let Some(verdict) = bins.verdict() else {
            debug!("No tempo candidates survived");
            return TempoEstimate::insufficient();
        };

        let estimate = TempoEstimate {
            bpm: verdict.bpm,
            confidence: verdict.confidence,
            alt_half: self.fold(verdict.bpm / 2.0),
            alt_double: self.fold(verdict.bpm * 2.0),
            methods: verdict.methods,
            candidates: verdict.centres,
        };

        debug!(
            "Tempo: {:.2} BPM (confidence {:.2}, {} bins, methods {:?})",
            estimate.bpm,
            estimate.confidence,
            bins.len(),
            estimate.methods.iter().map(|m| m.tag()).collect::<Vec<_>>()
        );
        estimate
    }

    /// Candidates derived from the onset envelope alone
    pub fn envelope_candidates(&self, envelope: &[f32], sample_rate: u32) -> Vec<Candidate> {
        let c = &self.config;
        let mut out = Vec::new();

        let ac = candidates::autocorrelation(
            envelope,
            sample_rate,
            c.hop,
            c.search_range,
            c.max_lag_secs,
            c.autocorr_top_k,
        );
        let ac_max = ac.iter().map(|&(_, m)| m).fold(0.0f64, f64::max) + 1e-9;
        out.extend(ac.iter().map(|&(bpm, mag)| {
            Candidate::new(self.fold(bpm), 1.0 + 0.8 * (mag / ac_max), TempoMethod::Autocorrelation)
        }));

        let sp = candidates::periodogram(envelope, sample_rate, c.hop, c.search_range, c.periodogram_top_k);
        let sp_max = sp.iter().map(|&(_, m)| m).fold(0.0f64, f64::max) + 1e-9;
        out.extend(sp.iter().map(|&(bpm, mag)| {
            Candidate::new(self.fold(bpm), 1.15 + 0.7 * (mag / sp_max), TempoMethod::Periodogram)
        }));

        let grid = track_beats(envelope, sample_rate, c.hop, &self.tracker_params());
        if grid.bpm.is_finite() && grid.bpm > 0.0 {
            out.push(Candidate::new(self.fold(grid.bpm), BEAT_TRACK_WEIGHT, TempoMethod::BeatTrack));
        }
        if let Some(ibi) = grid.ibi_bpm() {
            out.push(Candidate::new(self.fold(ibi), BEAT_TRACK_WEIGHT, TempoMethod::IbiMedian));
        }

        out
    }

    fn external_candidate(&self, buffer: &AudioBuffer) -> Option<Candidate> {
        let tracker = self.external.as_ref()?;
        match tracker.track(buffer) {
            Ok(beats) => {
                let bpm = self.fold(ibi_tempo(&beats)?);
                (bpm > 0.0).then(|| Candidate::new(bpm, EXTERNAL_WEIGHT, TempoMethod::ExternalTracker))
            }
            Err(e) => {
                warn!("{} failed, continuing without it: {}", tracker.name(), e);
                None
            }
        }
    }

    /// Single-method tempo used when fusion produces nothing
    ///
    /// External tracker first, then the beat tracker on a plain onset
    /// envelope. Returns 0 when neither yields a tempo.
    pub fn fallback_tempo(&self, buffer: &AudioBuffer) -> f64 {
        let normalized = buffer.peak_normalized();
        if let Some(c) = self.external_candidate(&normalized) {
            return c.bpm;
        }
        let params = OnsetParams {
            percussive: None,
            ..self.onset_params()
        };
        let envelope = onset_envelope(&normalized.samples, buffer.sample_rate, &params);
        let grid = track_beats(&envelope, buffer.sample_rate, self.config.hop, &self.tracker_params());
        self.fold(grid.bpm)
    }
}
