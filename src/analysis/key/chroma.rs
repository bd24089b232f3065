//! Tuning-corrected chroma features
//!
//! Works on a band-limited linear magnitude spectrogram `[time][bin]`
//! whose first row entry corresponds to FFT bin `first_bin`.

use crate::dsp::median;
use crate::dsp::peaks::parabolic_offset;

/// One 12-bin pitch-class frame, C first
pub type ChromaFrame = [f32; 12];

/// Band-limited magnitude spectrogram
#[derive(Debug, Clone)]
pub struct BandSpectrogram {
    pub frames: Vec<Vec<f32>>,
    pub first_bin: usize,
    pub n_fft: usize,
    pub sample_rate: u32,
}

impl BandSpectrogram {
    fn bin_hz(&self, bin: f64) -> f64 {
        bin * self.sample_rate as f64 / self.n_fft as f64
    }
}

/// Fractional MIDI pitch of a frequency
fn hz_to_midi(hz: f64) -> f64 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// Tuning deviation from A440 in fractional semitones, in [-0.5, 0.5)
///
/// Spectral peaks at or above the median peak magnitude are located with
/// parabolic refinement; their deviations from the nearest semitone are
/// histogrammed at 0.01-semitone resolution and the fullest bin wins.
pub fn estimate_tuning(spec: &BandSpectrogram) -> f64 {
    const RESOLUTION: f64 = 0.01;
    let num_bins = (1.0 / RESOLUTION).round() as usize;

    let mut peaks: Vec<(f64, f64)> = Vec::new();
    for frame in &spec.frames {
        let frame_max = frame.iter().cloned().fold(0.0f32, f32::max);
        if frame_max <= 0.0 {
            continue;
        }
        let threshold = 0.1 * frame_max;
        for k in 1..frame.len().saturating_sub(1) {
            let (y0, y1, y2) = (frame[k - 1] as f64, frame[k] as f64, frame[k + 1] as f64);
            if frame[k] >= threshold && y1 > y0 && y1 > y2 {
                let bin = (spec.first_bin + k) as f64 + parabolic_offset(y0, y1, y2);
                let hz = spec.bin_hz(bin);
                if hz > 0.0 {
                    peaks.push((hz_to_midi(hz), y1));
                }
            }
        }
    }

    let mags: Vec<f64> = peaks.iter().map(|&(_, m)| m).collect();
    let Some(cutoff) = median(&mags) else {
        return 0.0;
    };

    let mut histogram = vec![0usize; num_bins];
    for &(midi, mag) in &peaks {
        if mag < cutoff {
            continue;
        }
        let deviation = midi - midi.round();
        let idx = (((deviation + 0.5) / RESOLUTION).floor() as usize).min(num_bins - 1);
        histogram[idx] += 1;
    }

    let best = histogram
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map_or(num_bins / 2, |(i, _)| i);
    -0.5 + best as f64 * RESOLUTION
}

/// Fold each bin's magnitude into its tuning-corrected pitch class
pub fn chromagram(spec: &BandSpectrogram, tuning: f64) -> Vec<ChromaFrame> {
    let width = spec.frames.first().map_or(0, Vec::len);
    let classes: Vec<Option<usize>> = (0..width)
        .map(|k| {
            let hz = spec.bin_hz((spec.first_bin + k) as f64);
            if hz <= 0.0 {
                return None;
            }
            let midi = (hz_to_midi(hz) - tuning).round() as i64;
            Some(midi.rem_euclid(12) as usize)
        })
        .collect();

    spec.frames
        .iter()
        .map(|frame| {
            let mut chroma = [0.0f32; 12];
            for (&mag, class) in frame.iter().zip(classes.iter()) {
                if let Some(pc) = class {
                    chroma[*pc] += mag;
                }
            }
            chroma
        })
        .collect()
}

fn cosine(a: &ChromaFrame, b: &ChromaFrame) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::MIN_POSITIVE || nb <= f32::MIN_POSITIVE {
        return 0.0;
    }
    dot / (na * nb)
}

/// Replace each frame by the per-bin median of its `k` most similar frames
///
/// Similarity is cosine; a frame is never its own neighbour. `k == 0`
/// picks `2 * ceil(sqrt(frames))`. Frames without any positively similar
/// neighbour are kept as-is.
///
/// Every frame is compared with every other: O(frames^2) time, O(frames)
/// scratch per frame.
pub fn nn_filter(chroma: &[ChromaFrame], k: usize) -> Vec<ChromaFrame> {
    let n = chroma.len();
    if n < 2 {
        return chroma.to_vec();
    }
    let k = if k == 0 {
        2 * (n as f64).sqrt().ceil() as usize
    } else {
        k
    }
    .min(n - 1);

    let mut sims: Vec<(usize, f32)> = Vec::with_capacity(n);
    let mut column: Vec<f64> = Vec::with_capacity(k);
    chroma
        .iter()
        .enumerate()
        .map(|(t, frame)| {
            sims.clear();
            sims.extend(
                chroma
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != t)
                    .map(|(j, other)| (j, cosine(frame, other)))
                    .filter(|&(_, s)| s > 0.0),
            );
            if sims.is_empty() {
                return *frame;
            }
            if sims.len() > k {
                sims.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
                sims.truncate(k);
            }

            let mut out = [0.0f32; 12];
            for (pc, slot) in out.iter_mut().enumerate() {
                column.clear();
                column.extend(sims.iter().map(|&(j, _)| chroma[j][pc] as f64));
                *slot = median(&column).unwrap_or(0.0) as f32;
            }
            out
        })
        .collect()
}

/// Per-frame sum normalization followed by a per-bin median over time
pub fn profile(chroma: &[ChromaFrame]) -> [f64; 12] {
    let mut out = [0.0f64; 12];
    if chroma.is_empty() {
        return out;
    }
    let normalized: Vec<[f64; 12]> = chroma
        .iter()
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&v| v as f64).sum::<f64>() + 1e-9;
            let mut row = [0.0f64; 12];
            for (r, &v) in row.iter_mut().zip(frame.iter()) {
                *r = v as f64 / sum;
            }
            row
        })
        .collect();

    let mut column = Vec::with_capacity(normalized.len());
    for (pc, slot) in out.iter_mut().enumerate() {
        column.clear();
        column.extend(normalized.iter().map(|row| row[pc]));
        *slot = median(&column).unwrap_or(0.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromagram_maps_a440() {
        // 4096-point FFT at 40960 Hz: 10 Hz bins; bin 44 is 440 Hz
        let mut frame = vec![0.0f32; 100];
        frame[44] = 1.0;
        let spec = BandSpectrogram {
            frames: vec![frame],
            first_bin: 0,
            n_fft: 4096,
            sample_rate: 40960,
        };
        let chroma = chromagram(&spec, 0.0);
        assert_eq!(chroma[0][9], 1.0);
    }

    #[test]
    fn test_tuning_detects_sharp_tone() {
        // Synthesize a peak 0.25 semitones above A440 at an exact bin centre
        let n_fft = 4096;
        let sample_rate = 44100;
        let hz = 440.0 * 2f64.powf(0.25 / 12.0);
        let bin = hz * n_fft as f64 / sample_rate as f64;
        let centre = bin.round() as usize;
        let offset = bin - centre as f64;
        let mut frame = vec![0.0f32; 200];
        // Parabolic shape whose vertex sits at `bin`
        for d in -1i64..=1 {
            let x = d as f64 - offset;
            frame[(centre as i64 + d) as usize] = (1.0 - 0.2 * x * x) as f32;
        }
        let spec = BandSpectrogram {
            frames: vec![frame; 4],
            first_bin: 0,
            n_fft,
            sample_rate,
        };
        let tuning = estimate_tuning(&spec);
        assert!((tuning - 0.25).abs() < 0.02, "tuning {tuning}");
    }

    #[test]
    fn test_nn_filter_suppresses_outlier() {
        let steady = {
            let mut f = [0.0f32; 12];
            f[0] = 1.0;
            f[7] = 0.5;
            f
        };
        let noise = {
            let mut f = [0.0f32; 12];
            f[0] = 1.0;
            f[3] = 3.0;
            f
        };
        let mut chroma = vec![steady; 10];
        chroma[5] = noise;
        let filtered = nn_filter(&chroma, 3);
        assert!(filtered[5][3] < 0.1);
        assert!((filtered[5][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nn_filter_long_sequence_default_k() {
        let mut chroma: Vec<ChromaFrame> = (0..400)
            .map(|t| {
                let mut f = [0.0f32; 12];
                f[0] = 1.0;
                f[4] = 0.5 + 0.001 * (t % 7) as f32;
                f
            })
            .collect();
        chroma[123][10] = 5.0;
        let filtered = nn_filter(&chroma, 0);
        assert_eq!(filtered.len(), 400);
        assert!(filtered[123][10] < 0.1);
        assert!((filtered[123][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_profile_is_normalized_median() {
        let mut a = [0.0f32; 12];
        a[0] = 3.0;
        a[4] = 1.0;
        let p = profile(&[a, a, a]);
        assert!((p[0] - 0.75).abs() < 1e-6);
        assert!((p[4] - 0.25).abs() < 1e-6);
        assert_eq!(p[1], 0.0);
    }
}
