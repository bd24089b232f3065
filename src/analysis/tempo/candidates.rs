//! Periodicity estimators over an onset envelope
//!
//! Both return raw `(bpm, magnitude)` pairs, strongest first, unfolded.

use crate::dsp::correlate::{autocorrelate, remove_mean, zscore};
use crate::dsp::peaks::top_peaks;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Envelope frame rate in frames per second
fn frame_rate(sample_rate: u32, hop: usize) -> f64 {
    sample_rate as f64 / hop as f64
}

/// Peaks of the z-scored envelope's autocorrelation, refined to fractional lags
pub fn autocorrelation(
    envelope: &[f32],
    sample_rate: u32,
    hop: usize,
    range: (f64, f64),
    max_lag_secs: f64,
    top_k: usize,
) -> Vec<(f64, f64)> {
    let fps = frame_rate(sample_rate, hop);
    let max_lag = (max_lag_secs * fps).round() as usize;

    let mut ac = autocorrelate(&zscore(envelope), max_lag);
    if ac.len() < 3 {
        return Vec::new();
    }
    ac[0] = 0.0;

    let (lo, hi) = range;
    let lag_min = (60.0 * fps / hi).ceil().max(1.0) as usize;
    let lag_max = ((60.0 * fps / lo).floor() as usize).min(ac.len() - 1);
    if lag_min > lag_max {
        return Vec::new();
    }

    top_peaks(&ac, lag_min..lag_max + 1, top_k)
        .into_iter()
        .filter(|p| p.position > 0.0)
        .map(|p| (60.0 * fps / p.position, p.magnitude))
        .collect()
}

/// Peaks of the Hann-windowed envelope's magnitude spectrum
pub fn periodogram(
    envelope: &[f32],
    sample_rate: u32,
    hop: usize,
    range: (f64, f64),
    top_k: usize,
) -> Vec<(f64, f64)> {
    let n = envelope.len();
    if n < 4 {
        return Vec::new();
    }

    let mut x = remove_mean(envelope);
    let peak = x.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
    if peak > 0.0 {
        for v in x.iter_mut() {
            *v /= peak;
        }
    }

    // Symmetric Hann window
    let denom = (n - 1) as f64;
    let mut spectrum: Vec<Complex<f64>> = x
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let w = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos();
            Complex::new(v as f64 * w, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut spectrum);
    let mags: Vec<f64> = spectrum[..n / 2 + 1].iter().map(|c| c.norm()).collect();

    // Bin k sits at 60 * k * fps / n BPM
    let bpm_per_bin = 60.0 * frame_rate(sample_rate, hop) / n as f64;
    let (lo, hi) = range;
    let k_min = (lo / bpm_per_bin).ceil().max(1.0) as usize;
    let k_max = ((hi / bpm_per_bin).floor() as usize).min(mags.len() - 1);
    if k_min > k_max {
        return Vec::new();
    }

    top_peaks(&mags, k_min..k_max + 1, top_k)
        .into_iter()
        .map(|p| (p.position * bpm_per_bin, p.magnitude))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Impulse train at `bpm` sampled at `fps` frames per second
    fn pulse_envelope(bpm: f64, fps: f64, secs: f64) -> Vec<f32> {
        let n = (fps * secs) as usize;
        let period = 60.0 * fps / bpm;
        let mut env = vec![0.0f32; n];
        let mut t = 0.0;
        while (t as usize) < n {
            env[t as usize] = 1.0;
            t += period;
        }
        env
    }

    #[test]
    fn test_autocorrelation_finds_period() {
        // hop 256 @ 44100 Hz
        let env = pulse_envelope(120.0, 44100.0 / 256.0, 20.0);
        let cands = autocorrelation(&env, 44100, 256, (40.0, 220.0), 8.0, 8);
        assert!(!cands.is_empty());
        let best = cands[0].0;
        let folded = [best, best * 2.0, best / 2.0];
        assert!(
            folded.iter().any(|b| (b - 120.0).abs() < 1.5),
            "best autocorrelation candidate {best}"
        );
    }

    #[test]
    fn test_periodogram_finds_rate() {
        let env = pulse_envelope(100.0, 44100.0 / 256.0, 20.0);
        let cands = periodogram(&env, 44100, 256, (40.0, 220.0), 6);
        assert!(!cands.is_empty());
        assert!(
            cands.iter().any(|(b, _)| (b - 100.0).abs() < 1.5),
            "candidates {cands:?}"
        );
    }

    #[test]
    fn test_short_envelope() {
        assert!(periodogram(&[1.0, 0.0], 44100, 256, (40.0, 220.0), 6).is_empty());
        assert!(autocorrelation(&[1.0, 0.0], 44100, 256, (40.0, 220.0), 8.0, 8).is_empty());
    }
}
