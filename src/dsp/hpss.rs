//! Median-filtering harmonic/percussive separation
//!
//! Harmonic energy is smooth along time, percussive energy is smooth along
//! frequency. Each component is estimated by median-filtering the
//! spectrogram in one direction, and the input is split with soft masks:
//!
//! `mask_p = P^2 / (P^2 + (margin_p * H)^2)` and likewise for `mask_h`.
//!
//! Spectrograms are `[time][bin]` and non-negative.

/// Separated components, both the same shape as the input
#[derive(Debug, Clone)]
pub struct Separated {
    pub harmonic: Vec<Vec<f32>>,
    pub percussive: Vec<Vec<f32>>,
}

/// Split `spec` into harmonic and percussive parts
pub fn hpss(spec: &[Vec<f32>], kernel: usize, margin_h: f32, margin_p: f32) -> Separated {
    let num_frames = spec.len();
    let num_bins = spec.first().map_or(0, Vec::len);
    if num_frames == 0 || num_bins == 0 {
        return Separated {
            harmonic: spec.to_vec(),
            percussive: spec.to_vec(),
        };
    }

    let half = kernel.max(1) / 2;
    let smooth_time = median_along_time(spec, half);
    let smooth_freq = median_along_freq(spec, half);

    let mut harmonic = vec![vec![0.0f32; num_bins]; num_frames];
    let mut percussive = vec![vec![0.0f32; num_bins]; num_frames];
    for t in 0..num_frames {
        for k in 0..num_bins {
            let h = smooth_time[t][k];
            let p = smooth_freq[t][k];
            let x = spec[t][k];
            harmonic[t][k] = x * soft_mask(h, margin_h * p);
            percussive[t][k] = x * soft_mask(p, margin_p * h);
        }
    }

    Separated {
        harmonic,
        percussive,
    }
}

/// Wiener-style mask with power 2; 0.5 when both references vanish
fn soft_mask(x: f32, reference: f32) -> f32 {
    let z = x.max(reference);
    if z <= f32::MIN_POSITIVE {
        return 0.5;
    }
    let a = (x / z).powi(2);
    let b = (reference / z).powi(2);
    a / (a + b)
}

fn median_along_time(spec: &[Vec<f32>], half: usize) -> Vec<Vec<f32>> {
    let num_frames = spec.len();
    let num_bins = spec[0].len();
    let mut out = vec![vec![0.0f32; num_bins]; num_frames];
    let mut column = Vec::with_capacity(num_frames);
    let mut scratch = Vec::with_capacity(2 * half + 1);
    for k in 0..num_bins {
        column.clear();
        column.extend(spec.iter().map(|frame| frame[k]));
        for (t, row) in out.iter_mut().enumerate() {
            row[k] = window_median(&column, t, half, &mut scratch);
        }
    }
    out
}

fn median_along_freq(spec: &[Vec<f32>], half: usize) -> Vec<Vec<f32>> {
    let mut scratch = Vec::with_capacity(2 * half + 1);
    spec.iter()
        .map(|frame| {
            (0..frame.len())
                .map(|k| window_median(frame, k, half, &mut scratch))
                .collect()
        })
        .collect()
}

/// Median of `values[centre - half ..= centre + half]`, truncated at the edges
fn window_median(values: &[f32], centre: usize, half: usize, scratch: &mut Vec<f32>) -> f32 {
    let lo = centre.saturating_sub(half);
    let hi = (centre + half + 1).min(values.len());
    scratch.clear();
    scratch.extend_from_slice(&values[lo..hi]);
    let mid = scratch.len() / 2;
    let (_, median, _) = scratch.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line_is_harmonic() {
        // A steady tone in bin 5 across all frames
        let mut spec = vec![vec![0.01f32; 32]; 40];
        for frame in spec.iter_mut() {
            frame[5] = 10.0;
        }
        let sep = hpss(&spec, 17, 1.0, 3.0);
        assert!(sep.harmonic[20][5] > 9.0);
        assert!(sep.percussive[20][5] < 1.0);
    }

    #[test]
    fn test_vertical_line_is_percussive() {
        // A broadband click in frame 20
        let mut spec = vec![vec![0.01f32; 32]; 40];
        for v in spec[20].iter_mut() {
            *v = 10.0;
        }
        let sep = hpss(&spec, 17, 1.0, 1.0);
        assert!(sep.percussive[20][10] > 9.0);
        assert!(sep.harmonic[20][10] < 1.0);
    }

    #[test]
    fn test_empty_input() {
        let sep = hpss(&[], 17, 1.0, 3.0);
        assert!(sep.harmonic.is_empty());
    }
}
