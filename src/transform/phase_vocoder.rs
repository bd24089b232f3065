//! Built-in phase-vocoder time stretch and pitch shift
//!
//! Stretching resamples the STFT along time at steps of `rate` frames,
//! interpolating magnitudes linearly and accumulating phase from the
//! measured per-bin phase advance. Pitch shifting stretches by
//! `2^(-n/12)` and resamples the result back to the input length.

use super::TimePitchBackend;
use crate::dsp::stft::{istft, stft, Spectrogram};
use crate::error::Result;
use crate::types::AudioBuffer;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;

const N_FFT: usize = 2048;
const HOP: usize = 512;

/// Always-available spectral transformer
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseVocoder;

impl TimePitchBackend for PhaseVocoder {
    fn stretch(&self, buffer: &AudioBuffer, rate: f64) -> Result<AudioBuffer> {
        Ok(AudioBuffer::new(time_stretch(&buffer.samples, rate), buffer.sample_rate))
    }

    fn shift(&self, buffer: &AudioBuffer, semitones: f64) -> Result<AudioBuffer> {
        Ok(AudioBuffer::new(pitch_shift(&buffer.samples, semitones), buffer.sample_rate))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "phase-vocoder"
    }
}

/// Length of a signal of `len` samples played at `rate`
pub fn stretched_len(len: usize, rate: f64) -> usize {
    (len as f64 / rate).round() as usize
}

fn wrap_phase(x: f32) -> f32 {
    x - 2.0 * PI * (x / (2.0 * PI)).round()
}

/// Time-stretch by `rate` (> 1 is faster/shorter), pitch unchanged
pub fn time_stretch(samples: &[f32], rate: f64) -> Vec<f32> {
    if samples.is_empty() || !rate.is_finite() || rate <= 0.0 {
        return samples.to_vec();
    }
    if (rate - 1.0).abs() < 1e-9 {
        return samples.to_vec();
    }

    let spec = stft(samples, N_FFT, HOP);
    let num_bins = spec.num_bins();
    let num_frames = spec.num_frames();

    let advance: Vec<f32> = (0..num_bins)
        .map(|k| 2.0 * PI * k as f32 * HOP as f32 / N_FFT as f32)
        .collect();
    let silent = vec![Complex::new(0.0f32, 0.0); num_bins];
    let frame_at = |t: usize| spec.frames.get(t).unwrap_or(&silent);

    let mut phase: Vec<f32> = frame_at(0).iter().map(|c| c.arg()).collect();
    let mut frames = Vec::new();
    let mut step = 0.0f64;
    while step < num_frames as f64 {
        let t = step.floor() as usize;
        let alpha = (step - t as f64) as f32;
        let (a, b) = (frame_at(t), frame_at(t + 1));

        let mut frame = Vec::with_capacity(num_bins);
        for k in 0..num_bins {
            let mag = (1.0 - alpha) * a[k].norm() + alpha * b[k].norm();
            frame.push(Complex::from_polar(mag, phase[k]));
            let delta = wrap_phase(b[k].arg() - a[k].arg() - advance[k]);
            phase[k] += advance[k] + delta;
        }
        frames.push(frame);
        step += rate;
    }

    let out = Spectrogram {
        frames,
        n_fft: N_FFT,
        hop: HOP,
    };
    istft(&out, stretched_len(samples.len(), rate))
}

/// Shift pitch by `semitones`, duration unchanged
pub fn pitch_shift(samples: &[f32], semitones: f64) -> Vec<f32> {
    if samples.is_empty() || !semitones.is_finite() || semitones.abs() < 1e-9 {
        return samples.to_vec();
    }
    let rate = 2f64.powf(-semitones / 12.0);
    let stretched = time_stretch(samples, rate);
    resample_to_len(&stretched, samples.len())
}

/// Catmull-Rom interpolation of `samples` onto `len` evenly spaced points
pub fn resample_to_len(samples: &[f32], len: usize) -> Vec<f32> {
    if samples.is_empty() || len == 0 {
        return vec![0.0; len];
    }
    let n = samples.len();
    let at = |i: isize| samples[i.clamp(0, n as isize - 1) as usize];
    let step = n as f64 / len as f64;
    (0..len)
        .map(|j| {
            let x = j as f64 * step;
            let i = x.floor() as isize;
            let t = (x - i as f64) as f32;
            let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
            p1 + 0.5
                * t
                * (p2 - p0 + t * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3 + t * (3.0 * (p1 - p2) + p3 - p0)))
        })
        .collect()
}
