//! Centered STFT / ISTFT for mono signals
//!
//! Frames are centered: frame `t` covers samples around `t * hop`, with
//! `n_fft / 2` zeros padded on each side. A signal of length `L` yields
//! `1 + L / hop` frames.
//!
//! The Hann window is periodic. Synthesis divides by the summed squared
//! window so that `istft(stft(x))` reproduces `x` away from the edges.

use rustfft::{num_complex::Complex, FftPlanner};

/// Complex spectrogram of a mono signal: `frames[time][bin]`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<Complex<f32>>>,
    pub n_fft: usize,
    pub hop: usize,
}

impl Spectrogram {
    /// Number of positive-frequency bins (`n_fft / 2 + 1`)
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Magnitude spectrogram, `[time][bin]`
    pub fn magnitudes(&self) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Power spectrogram, `[time][bin]`
    pub fn powers(&self) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Centre frequency of a bin in Hz
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.n_fft as f32
    }
}

/// Compute the centered STFT of `samples`
pub fn stft(samples: &[f32], n_fft: usize, hop: usize) -> Spectrogram {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let half = n_fft / 2;
    let num_bins = half + 1;
    let num_frames = 1 + samples.len() / hop;
    let mut frames = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    for frame_idx in 0..num_frames {
        // Position of buffer[0] in the unpadded signal
        let origin = (frame_idx * hop) as isize - half as isize;
        for (i, (slot, &w)) in buffer.iter_mut().zip(window.iter()).enumerate() {
            let pos = origin + i as isize;
            let sample = if pos >= 0 && (pos as usize) < samples.len() {
                samples[pos as usize]
            } else {
                0.0
            };
            *slot = Complex::new(sample * w, 0.0);
        }

        fft.process(&mut buffer);
        frames.push(buffer[..num_bins].to_vec());
    }

    Spectrogram { frames, n_fft, hop }
}

/// Inverse of [`stft`], producing exactly `length` samples
pub fn istft(spec: &Spectrogram, length: usize) -> Vec<f32> {
    let n_fft = spec.n_fft;
    let hop = spec.hop;
    let half = n_fft / 2;
    let num_bins = spec.num_bins();

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let window = hann_window(n_fft);

    // Padded output covers every frame; the first `half` samples are padding
    let padded_len = n_fft + hop * spec.frames.len().saturating_sub(1);
    let mut output = vec![0.0f32; padded_len];
    let mut window_sum = vec![0.0f32; padded_len];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
    let scale = 1.0 / n_fft as f32;

    for (frame_idx, frame) in spec.frames.iter().enumerate() {
        let start = frame_idx * hop;

        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = if i < num_bins {
                frame[i]
            } else {
                // Conjugate mirror of the positive half
                frame[n_fft - i].conj()
            };
        }

        ifft.process(&mut buffer);

        for (i, &w) in window.iter().enumerate() {
            output[start + i] += buffer[i].re * scale * w;
            window_sum[start + i] += w * w;
        }
    }

    for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
        if ws > 1e-8 {
            *sample /= ws;
        }
    }

    let mut result: Vec<f32> = output.into_iter().skip(half).take(length).collect();
    result.resize(length, 0.0);
    result
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        let spec = stft(&vec![0.0; 10_000], 2048, 512);
        assert_eq!(spec.num_frames(), 1 + 10_000 / 512);
        assert_eq!(spec.num_bins(), 1025);
    }

    #[test]
    fn test_sine_peak_bin() {
        let sr = 44100u32;
        let freq = 1000.0f32;
        let samples: Vec<f32> = (0..sr as usize)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        let spec = stft(&samples, 2048, 512);
        let mags = spec.magnitudes();
        let mid = &mags[mags.len() / 2];
        let peak_bin = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let peak_freq = spec.bin_frequency(peak_bin, sr);
        assert!((peak_freq - freq).abs() < 30.0, "peak at {peak_freq} Hz");
    }

    #[test]
    fn test_reconstruction() {
        let samples: Vec<f32> = (0..8000).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let spec = stft(&samples, 1024, 256);
        let out = istft(&spec, samples.len());
        assert_eq!(out.len(), samples.len());
        for i in 1024..7000 {
            assert!((out[i] - samples[i]).abs() < 1e-3, "sample {i} differs");
        }
    }
}
