//! Sample-rate conversion
//!
//! rubato's FFT resampler does the work; a linear interpolator covers the
//! cases where rubato cannot be constructed for a rate pair.

use rubato::{FftFixedInOut, Resampler};
use tracing::debug;

/// Input frames per rubato chunk
const CHUNK_SIZE: usize = 1024;

/// Convert mono `samples` from `from_rate` to `to_rate`
///
/// The output holds `ceil(len * to_rate / from_rate)` samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let mut resampler =
        match FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 1) {
            Ok(r) => r,
            Err(e) => {
                debug!("Rubato initialization failed ({}), using linear resampler", e);
                return resample_linear(samples, from_rate, to_rate);
            }
        };

    let frames_in = resampler.input_frames_next();
    let delay = resampler.output_delay();

    let ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected_len + delay + resampler.output_frames_next());

    // Zero chunks past the end flush the filter delay
    let mut chunk = vec![0.0f32; frames_in];
    let mut start = 0;
    while output.len() < delay + expected_len {
        let filled = samples.len().saturating_sub(start).min(frames_in);
        if filled > 0 {
            chunk[..filled].copy_from_slice(&samples[start..start + filled]);
        }
        chunk[filled..].fill(0.0);

        match resampler.process(&[chunk.as_slice()], None) {
            Ok(resampled) => match resampled.first() {
                Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
                _ => break,
            },
            Err(e) => {
                debug!("Rubato processing error ({}), using linear resampler", e);
                return resample_linear(samples, from_rate, to_rate);
            }
        }
        start += frames_in;
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected_len, 0.0);
    output
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            if idx < last {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[last]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(resample(&samples, 44100, 44100), samples);
    }

    #[test]
    fn test_resample_lengths() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        assert_eq!(resample(&samples, 22050, 44100).len(), 2000);
        assert_eq!(resample(&samples, 48000, 44100).len(), 919);
    }

    #[test]
    fn test_resample_sine_amplitude() {
        use std::f32::consts::PI;
        let samples: Vec<f32> = (0..8000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 48000.0).sin())
            .collect();
        let result = resample(&samples, 48000, 44100);
        let max_val = result.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_val = result.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max_val > 0.9, "max {max_val}");
        assert!(min_val < -0.9, "min {min_val}");
    }

    #[test]
    fn test_resample_has_no_delay() {
        let mut samples = vec![0.0f32; 4000];
        samples[1000] = 1.0;
        let result = resample(&samples, 22050, 44100);
        let peak = result
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - 2000).abs() <= 2, "peak at {peak}");
    }

    #[test]
    fn test_linear_midpoints() {
        let result = resample_linear(&[0.0, 1.0, 2.0], 1, 2);
        assert_eq!(result.len(), 6);
        assert!((result[1] - 0.5).abs() < 1e-6);
        assert!((result[3] - 1.5).abs() < 1e-6);
    }
}
