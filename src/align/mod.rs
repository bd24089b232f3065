//! Beat-anchored alignment of the vocal against the instrumental
//!
//! The instrumental's beat grid supplies anchor times; the vocal's first
//! strong onset is moved onto each anchor (and half/whole beats around
//! it) and the candidate whose onset envelope correlates best with the
//! instrumental's wins, minus a small penalty for lateness. Without a
//! usable grid a single global cross-correlation lag is used instead.
//!
//! Either way the returned buffer has exactly the instrumental's length.

use crate::analysis::beat::{track_beats, TrackerParams};
use crate::config::AlignConfig;
use crate::dsp::correlate::{best_lag, pearson, remove_mean, zscore};
use crate::dsp::onset::{frame_to_time, onset_envelope, OnsetParams};
use crate::types::{AlignMethod, AlignmentResult, AudioBuffer};
use tracing::{debug, warn};

/// Percussive separation used for the instrumental's beat grid
const PERCUSSIVE: (usize, f32) = (17, 3.0);
/// Envelopes shorter than this cannot be correlated
const MIN_SCORE_FRAMES: usize = 24;
/// Vocal envelopes shorter than this have no meaningful first onset
const MIN_SEEK_FRAMES: usize = 16;
/// Anchors used when no beat falls in the early window
const FALLBACK_ANCHORS: usize = 8;

/// Aligned vocal plus how it was aligned
#[derive(Debug, Clone)]
pub struct Aligned {
    pub buffer: AudioBuffer,
    pub result: AlignmentResult,
}

/// Shift `samples` by `shift` (positive delays) and fit to `len`
pub fn shift_and_fit(samples: &[f32], shift: isize, len: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; len];
    for (n, slot) in out.iter_mut().enumerate() {
        let src = n as isize - shift;
        if src >= 0 && (src as usize) < samples.len() {
            *slot = samples[src as usize];
        }
    }
    out
}

/// Vocal-to-instrumental aligner
#[derive(Debug, Clone, Default)]
pub struct Aligner {
    config: AlignConfig,
}

struct Scored {
    anchor: f64,
    shift_frames: isize,
    raw: f64,
    penalized: f64,
}

impl Aligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    fn plain(&self) -> OnsetParams {
        OnsetParams::plain(self.config.n_fft, self.config.hop)
    }

    fn analysis_len(&self, sample_rate: u32) -> usize {
        (self.config.analysis_secs * sample_rate as f64) as usize
    }

    /// Align `vocal` to `target`; never fails
    pub fn align(&self, vocal: &AudioBuffer, target: &AudioBuffer) -> Aligned {
        if vocal.sample_rate != target.sample_rate {
            warn!(
                "Aligning buffers at different rates ({} vs {}Hz)",
                vocal.sample_rate, target.sample_rate
            );
        }
        let sr = target.sample_rate;
        let c = &self.config;
        let window = self.analysis_len(sr);
        let inst = &target.samples[..target.len().min(window)];

        let params = OnsetParams {
            percussive: Some(PERCUSSIVE),
            ..self.plain()
        };
        let grid = track_beats(
            &onset_envelope(inst, sr, &params),
            sr,
            c.hop,
            &TrackerParams::default(),
        );

        if grid.beats.len() < c.min_beats {
            debug!("Only {} beats in the instrumental; using global correlation", grid.beats.len());
            return self.align_simple(vocal, target);
        }
        self.align_to_beats(vocal, target, grid.bpm, &grid.beats)
    }

    fn align_to_beats(&self, vocal: &AudioBuffer, target: &AudioBuffer, bpm: f64, beats: &[f64]) -> Aligned {
        let c = &self.config;
        let sr = target.sample_rate;
        let window = self.analysis_len(sr);
        let fps = sr as f64 / c.hop as f64;

        let vocal_env = onset_envelope(&vocal.samples[..vocal.len().min(window)], sr, &self.plain());
        let t_v0 = self.first_strong_onset(&vocal_env, sr);

        let score_secs = c.analysis_secs.min(target.duration());
        let score_len = (score_secs * sr as f64) as usize;
        let inst_env = onset_envelope(&target.samples[..score_len.min(target.len())], sr, &self.plain());

        let candidates = self.candidates(bpm, beats);
        let score = |anchor: f64, shift_frames: isize| -> Scored {
            let shifted = shift_and_fit(&vocal_env, shift_frames, inst_env.len());
            let raw = if inst_env.len() < MIN_SCORE_FRAMES {
                -1.0
            } else {
                pearson(&zscore(&shifted), &zscore(&inst_env))
            };
            Scored {
                anchor,
                shift_frames,
                raw,
                penalized: raw - c.late_penalty_per_sec * anchor.max(0.0),
            }
        };

        let mut best: Option<Scored> = None;
        for &anchor in &candidates {
            let frames = ((anchor - t_v0) * fps).round() as isize;
            let s = score(anchor, frames);
            if s.penalized.is_finite() && best.as_ref().map_or(true, |b| s.penalized > b.penalized) {
                best = Some(s);
            }
        }

        if let Some(winner) = best.take() {
            let mut refined = winner;
            let centre = refined.shift_frames;
            for d in 1..=c.refine_frames as isize {
                for frames in [centre - d, centre + d] {
                    let anchor = refined.anchor + (frames - refined.shift_frames) as f64 / fps;
                    let s = score(anchor, frames);
                    if s.penalized.is_finite() && s.penalized > refined.penalized {
                        refined = s;
                    }
                }
            }
            best = Some(refined);
        }

        let Some(best) = best else {
            return self.finish(vocal, target, 0, 0.0, AlignMethod::BeatAnchored);
        };

        let shift_samples = ((best.anchor - t_v0) * sr as f64).round() as isize;
        debug!(
            "Beat-anchored: vocal onset {:.3}s, anchor {:.3}s, score {:.3}",
            t_v0, best.anchor, best.raw
        );
        self.finish(vocal, target, shift_samples, best.raw, AlignMethod::BeatAnchored)
    }

    /// Anchor times: early beats plus half and whole beats either side
    fn candidates(&self, bpm: f64, beats: &[f64]) -> Vec<f64> {
        let c = &self.config;
        let beat_dur = 60.0 / if bpm > 1e-6 { bpm } else { 120.0 };
        let early = c.analysis_secs.min(c.max_anchor_beats as f64 * beat_dur);

        let mut anchors: Vec<f64> = beats.iter().copied().filter(|&b| b <= early).collect();
        if anchors.is_empty() {
            anchors = beats.iter().copied().take(FALLBACK_ANCHORS).collect();
        }

        let (lo, hi) = c.candidate_range;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for b in anchors {
            for cand in [b, b + 0.5 * beat_dur, b - 0.5 * beat_dur, b + beat_dur, b - beat_dur] {
                let key = (cand * 1000.0).round() as i64;
                if cand >= lo && cand <= hi && seen.insert(key) {
                    out.push(cand);
                }
            }
        }
        if out.is_empty() {
            out.push(0.0);
        }
        out
    }

    /// Time of the vocal's first strong onset
    ///
    /// The first frame whose z-score exceeds the threshold after the guard
    /// window; the first crossing at all if every crossing is inside the
    /// guard; the strongest frame if nothing crosses.
    pub fn first_strong_onset(&self, envelope: &[f32], sample_rate: u32) -> f64 {
        let c = &self.config;
        let max_frames = (c.max_seek_secs * sample_rate as f64 / c.hop as f64) as usize;
        let env = &envelope[..envelope.len().min(max_frames)];
        if env.len() < MIN_SEEK_FRAMES {
            return 0.0;
        }

        let z = zscore(env);
        let guard = (c.onset_guard_secs * sample_rate as f64 / c.hop as f64).ceil() as usize;
        let crossings: Vec<usize> = z
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > c.strong_onset_z)
            .map(|(i, _)| i)
            .collect();

        let idx = match crossings.iter().find(|&&i| i >= guard) {
            Some(&i) => i,
            None => match crossings.first() {
                Some(&i) => i,
                None => z
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
                    .map_or(0, |(i, _)| i),
            },
        };
        frame_to_time(idx, c.hop, sample_rate)
    }

    /// Global cross-correlation fallback
    pub fn align_simple(&self, vocal: &AudioBuffer, target: &AudioBuffer) -> Aligned {
        let c = &self.config;
        let sr = target.sample_rate;
        let seg = vocal.len().min(target.len()).min(self.analysis_len(sr));
        let ov = onset_envelope(&vocal.samples[..seg], sr, &self.plain());
        let oi = onset_envelope(&target.samples[..seg], sr, &self.plain());

        if ov.len().max(oi.len()) < MIN_SCORE_FRAMES {
            debug!("Envelopes too short to correlate; length matching only");
            return self.finish(vocal, target, 0, 0.0, AlignMethod::Passthrough);
        }

        // Vocal event at frame n + k matching instrumental frame n: shift by -k
        let Some((lag, _)) = best_lag(&remove_mean(&oi), &remove_mean(&ov)) else {
            return self.finish(vocal, target, 0, 0.0, AlignMethod::Passthrough);
        };
        let shift_frames = -lag;
        let score = pearson(&shift_and_fit(&ov, shift_frames, oi.len()), &oi);
        debug!("Global correlation lag {} frames, score {:.3}", shift_frames, score);
        self.finish(
            vocal,
            target,
            shift_frames * c.hop as isize,
            score,
            AlignMethod::GlobalCorrelation,
        )
    }

    fn finish(
        &self,
        vocal: &AudioBuffer,
        target: &AudioBuffer,
        shift_samples: isize,
        score: f64,
        method: AlignMethod,
    ) -> Aligned {
        let sr = target.sample_rate;
        let score = if score.is_finite() { score.clamp(-1.0, 1.0) } else { 0.0 };
        Aligned {
            buffer: AudioBuffer::new(shift_and_fit(&vocal.samples, shift_samples, target.len()), sr),
            result: AlignmentResult {
                offset_seconds: if sr > 0 { shift_samples as f64 / sr as f64 } else { 0.0 },
                score,
                method,
            },
        }
    }
}
