//! Onset-strength envelope
//!
//! Mel power spectrogram in dB, positive first difference along time,
//! averaged over bands. Frame `t` sits at sample `t * hop`.
//!
//! With `percussive` set, the mel spectrogram is first reduced to its
//! percussive component so sustained harmonic energy does not produce
//! spurious onsets.

use super::hpss::hpss;
use super::mel::{power_to_db, MelFilterbank};
use super::stft::stft;

/// Dynamic range kept below the loudest mel cell
const TOP_DB: f32 = 80.0;

/// Envelope parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetParams {
    pub n_fft: usize,
    pub hop: usize,
    pub n_mels: usize,
    /// Median kernel and percussive margin, when percussive-biased
    pub percussive: Option<(usize, f32)>,
}

impl OnsetParams {
    /// Plain onset strength (no separation)
    pub fn plain(n_fft: usize, hop: usize) -> Self {
        Self {
            n_fft,
            hop,
            n_mels: 64,
            percussive: None,
        }
    }
}

/// Compute the onset-strength envelope of `samples`
pub fn onset_envelope(samples: &[f32], sample_rate: u32, params: &OnsetParams) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let spec = stft(samples, params.n_fft, params.hop);
    let filterbank = MelFilterbank::new(sample_rate, params.n_fft, params.n_mels);
    let mut mel: Vec<Vec<f32>> = spec
        .powers()
        .iter()
        .map(|frame| filterbank.apply(frame))
        .collect();

    if let Some((kernel, margin)) = params.percussive {
        mel = hpss(&mel, kernel, 1.0, margin).percussive;
    }

    power_to_db(&mut mel, TOP_DB);
    spectral_flux(&mel)
}

/// Mean positive difference between consecutive frames (first frame is 0)
pub fn spectral_flux(spec: &[Vec<f32>]) -> Vec<f32> {
    let mut env = Vec::with_capacity(spec.len());
    if spec.is_empty() {
        return env;
    }
    env.push(0.0);
    for pair in spec.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let bands = cur.len().max(1) as f32;
        let rise: f32 = cur
            .iter()
            .zip(prev.iter())
            .map(|(&c, &p)| (c - p).max(0.0))
            .sum();
        env.push(rise / bands);
    }
    env
}

/// Time in seconds of envelope frame `frame`
pub fn frame_to_time(frame: usize, hop: usize, sample_rate: u32) -> f64 {
    (frame * hop) as f64 / sample_rate as f64
}

/// Nearest envelope frame for time `secs`
pub fn time_to_frame(secs: f64, hop: usize, sample_rate: u32) -> usize {
    (secs.max(0.0) * sample_rate as f64 / hop as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicks(sr: u32, interval_secs: f64, secs: f64) -> Vec<f32> {
        let mut samples = vec![0.0f32; (sr as f64 * secs) as usize];
        let step = (sr as f64 * interval_secs) as usize;
        let mut pos = step / 2;
        while pos + 200 < samples.len() {
            for i in 0..200 {
                samples[pos + i] = (1.0 - i as f32 / 200.0) * if i % 2 == 0 { 1.0 } else { -1.0 };
            }
            pos += step;
        }
        samples
    }

    #[test]
    fn test_envelope_length() {
        let samples = vec![0.0f32; 44100];
        let env = onset_envelope(&samples, 44100, &OnsetParams::plain(2048, 512));
        assert_eq!(env.len(), 1 + 44100 / 512);
    }

    #[test]
    fn test_clicks_produce_peaks() {
        let sr = 22050;
        let samples = clicks(sr, 0.5, 4.0);
        let params = OnsetParams {
            percussive: Some((17, 3.0)),
            ..OnsetParams::plain(2048, 256)
        };
        let env = onset_envelope(&samples, sr, &params);
        let mean = env.iter().sum::<f32>() / env.len() as f32;
        // Click at 0.25 s lands near frame 21
        let around = env[18..25].iter().cloned().fold(0.0f32, f32::max);
        assert!(around > 2.0 * mean, "peak {around} vs mean {mean}");
    }

    #[test]
    fn test_flux_ignores_decay() {
        let spec = vec![vec![0.0, 0.0], vec![4.0, 2.0], vec![1.0, 1.0]];
        assert_eq!(spectral_flux(&spec), vec![0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_frame_time_conversion() {
        assert_eq!(time_to_frame(frame_to_time(40, 512, 44100), 512, 44100), 40);
    }
}
