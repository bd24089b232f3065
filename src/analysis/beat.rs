//! Dynamic-programming beat tracker
//!
//! 1. Global tempo: autocorrelation of the onset envelope weighted by a
//!    log-normal prior centred on `start_bpm` (one octave standard deviation).
//! 2. Local score: the std-normalized envelope smoothed by a Gaussian whose
//!    width scales with the beat period.
//! 3. Forward pass: each frame links back to the best predecessor between
//!    2 and 1/2 periods earlier, penalized by
//!    `tightness * ln(interval / period)^2`.
//! 4. The last beat is the latest local maximum of the cumulative score
//!    above half the median of those maxima; beats are read off backwards
//!    and weak leading/trailing beats are trimmed.

use crate::dsp::correlate::autocorrelate;
use crate::dsp::median;
use crate::dsp::onset::frame_to_time;
use tracing::trace;

/// Fastest tempo the prior search considers
const MAX_TEMPO: f64 = 320.0;
/// Autocorrelation window for the tempo estimate, seconds
const AC_SIZE_SECS: f64 = 8.0;

/// Tempo and beat positions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatGrid {
    /// Global tempo estimate (0 when none)
    pub bpm: f64,
    /// Beat times in seconds, ascending
    pub beats: Vec<f64>,
}

impl BeatGrid {
    /// Tempo implied by the median positive inter-beat interval
    pub fn ibi_bpm(&self) -> Option<f64> {
        ibi_tempo(&self.beats)
    }
}

/// `60 / median(diff(beats))` over positive intervals
pub fn ibi_tempo(beats: &[f64]) -> Option<f64> {
    let intervals: Vec<f64> = beats
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&d| d > 0.0)
        .collect();
    median(&intervals).map(|m| 60.0 / m)
}

/// Beat tracker parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerParams {
    pub start_bpm: f64,
    pub tightness: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            start_bpm: 120.0,
            tightness: 100.0,
        }
    }
}

/// Global tempo of an onset envelope (0 when the envelope is flat)
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop: usize, start_bpm: f64) -> f64 {
    let fps = sample_rate as f64 / hop as f64;
    let max_lag = (AC_SIZE_SECS * fps).round() as usize;
    let ac = autocorrelate(envelope, max_lag);
    if ac.len() < 3 {
        return 0.0;
    }

    let min_lag = ((60.0 * fps / MAX_TEMPO).floor() as usize).max(1);
    let log_start = start_bpm.log2();

    let mut best: Option<(usize, f64)> = None;
    for (lag, &value) in ac.iter().enumerate().skip(min_lag) {
        if value <= 0.0 {
            continue;
        }
        let bpm = 60.0 * fps / lag as f64;
        let prior = (-0.5 * (bpm.log2() - log_start).powi(2)).exp();
        let score = value * prior;
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    best.map_or(0.0, |(lag, _)| 60.0 * fps / lag as f64)
}

/// Track beats through an onset envelope
pub fn track_beats(envelope: &[f32], sample_rate: u32, hop: usize, params: &TrackerParams) -> BeatGrid {
    if envelope.iter().all(|&v| v == 0.0) {
        return BeatGrid::default();
    }

    let bpm = estimate_tempo(envelope, sample_rate, hop, params.start_bpm);
    if bpm <= 0.0 {
        return BeatGrid::default();
    }

    let fps = sample_rate as f64 / hop as f64;
    let period = 60.0 * fps / bpm;
    let local = local_score(&normalize_by_std(envelope), period);
    let frames = dynamic_program(&local, period, params.tightness);

    trace!("Beat tracker: {:.2} BPM, {} beats", bpm, frames.len());

    BeatGrid {
        bpm,
        beats: frames
            .into_iter()
            .map(|f| frame_to_time(f, hop, sample_rate))
            .collect(),
    }
}

/// Divide by the sample standard deviation
fn normalize_by_std(envelope: &[f32]) -> Vec<f64> {
    let n = envelope.len();
    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let var = envelope
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / (n.saturating_sub(1).max(1)) as f64;
    let std = var.sqrt();
    let scale = if std > 0.0 { 1.0 / std } else { 1.0 };
    envelope.iter().map(|&v| v as f64 * scale).collect()
}

/// Gaussian-smoothed onset strength ("same"-size convolution)
fn local_score(onsets: &[f64], period: f64) -> Vec<f64> {
    let half = period.round() as isize;
    let window: Vec<f64> = (-half..=half)
        .map(|i| (-0.5 * (i as f64 * 32.0 / period).powi(2)).exp())
        .collect();

    let n = onsets.len() as isize;
    (0..n)
        .map(|t| {
            window
                .iter()
                .enumerate()
                .map(|(j, &w)| {
                    let src = t + half - j as isize;
                    if src >= 0 && src < n {
                        onsets[src as usize] * w
                    } else {
                        0.0
                    }
                })
                .sum()
        })
        .collect()
}

fn dynamic_program(local: &[f64], period: f64, tightness: f64) -> Vec<usize> {
    let n = local.len();
    if n == 0 {
        return Vec::new();
    }

    let max_local = local.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let score_thresh = 0.01 * max_local;
    let near = (period / 2.0).round() as usize;
    let far = (2.0 * period).round() as usize;
    let log_period = period.ln();

    let mut cumscore = vec![0.0f64; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];
    let mut first_beat = true;

    for i in 0..n {
        let mut best: Option<(usize, f64)> = None;
        if i >= near {
            let lo = i.saturating_sub(far);
            for loc in (lo..=i - near).rev() {
                let interval = (i - loc) as f64;
                if interval <= 0.0 {
                    continue;
                }
                let score = cumscore[loc] - tightness * (interval.ln() - log_period).powi(2);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((loc, score));
                }
            }
        }

        cumscore[i] = local[i] + best.map_or(0.0, |(_, s)| s);
        if first_beat && local[i] < score_thresh {
            backlink[i] = None;
        } else {
            backlink[i] = best.map(|(loc, _)| loc);
            first_beat = false;
        }
    }

    let Some(last) = last_beat(&cumscore) else {
        return Vec::new();
    };

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();

    trim_beats(local, beats)
}

/// Latest cumulative-score local maximum above half their median
fn last_beat(cumscore: &[f64]) -> Option<usize> {
    let maxima: Vec<usize> = (1..cumscore.len().saturating_sub(1))
        .filter(|&i| cumscore[i] > cumscore[i - 1] && cumscore[i] >= cumscore[i + 1])
        .collect();
    if maxima.is_empty() {
        return cumscore
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
    }
    let values: Vec<f64> = maxima.iter().map(|&i| cumscore[i]).collect();
    let threshold = 0.5 * median(&values)?;
    maxima.into_iter().filter(|&i| cumscore[i] > threshold).last()
}

/// Drop leading and trailing beats whose smoothed local score is weak
fn trim_beats(local: &[f64], beats: Vec<usize>) -> Vec<usize> {
    if beats.len() < 3 {
        return beats;
    }
    // 5-point Hann smoothing of the score at each beat
    const HANN5: [f64; 5] = [0.0, 0.5, 1.0, 0.5, 0.0];
    let at_beats: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let smoothed: Vec<f64> = (0..at_beats.len() as isize)
        .map(|i| {
            HANN5
                .iter()
                .enumerate()
                .map(|(j, &w)| {
                    let src = i + 2 - j as isize;
                    if src >= 0 && (src as usize) < at_beats.len() {
                        at_beats[src as usize] * w
                    } else {
                        0.0
                    }
                })
                .sum()
        })
        .collect();
    let rms = (smoothed.iter().map(|v| v * v).sum::<f64>() / smoothed.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let first = smoothed.iter().position(|&v| v > threshold);
    let last = smoothed.iter().rposition(|&v| v > threshold);
    match (first, last) {
        (Some(a), Some(b)) if a <= b => beats[a..=b].to_vec(),
        _ => beats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decaying pulses at `bpm` on an envelope at `fps`
    fn pulse_envelope(bpm: f64, fps: f64, secs: f64) -> Vec<f32> {
        let n = (fps * secs) as usize;
        let period = 60.0 * fps / bpm;
        let mut env = vec![0.0f32; n];
        let mut t = period / 2.0;
        while (t as usize) + 3 < n {
            let i = t as usize;
            env[i] = 1.0;
            env[i + 1] = 0.5;
            env[i + 2] = 0.2;
            t += period;
        }
        env
    }

    #[test]
    fn test_estimate_tempo_prefers_true_tempo() {
        let fps = 44100.0 / 256.0;
        let env = pulse_envelope(120.0, fps, 20.0);
        let bpm = estimate_tempo(&env, 44100, 256, 120.0);
        assert!((bpm - 120.0).abs() < 2.0, "tempo {bpm}");
    }

    #[test]
    fn test_track_beats_spacing() {
        let fps = 44100.0 / 512.0;
        let env = pulse_envelope(100.0, fps, 20.0);
        let grid = track_beats(&env, 44100, 512, &TrackerParams::default());
        assert!(grid.beats.len() >= 20, "{} beats", grid.beats.len());
        let ibi = grid.ibi_bpm().expect("intervals");
        assert!((ibi - 100.0).abs() < 3.0, "ibi tempo {ibi}");
    }

    #[test]
    fn test_silence_has_no_beats() {
        let grid = track_beats(&vec![0.0; 1000], 44100, 512, &TrackerParams::default());
        assert!(grid.beats.is_empty());
        assert_eq!(grid.bpm, 0.0);
    }

    #[test]
    fn test_trim_keeps_soft_leading_beat() {
        // A softer first beat is still above half the smoothed RMS
        let mut local = vec![1.0; 200];
        let beats: Vec<usize> = (0..10).map(|i| 10 + i * 20).collect();
        local[beats[0]] = 0.7;
        let trimmed = trim_beats(&local, beats.clone());
        assert_eq!(trimmed.first(), Some(&beats[0]));
        assert_eq!(trimmed.last(), Some(&beats[9]));
    }

    #[test]
    fn test_ibi_tempo() {
        assert_eq!(ibi_tempo(&[0.0, 0.5, 1.0, 1.5]), Some(120.0));
        assert_eq!(ibi_tempo(&[1.0]), None);
    }
}
