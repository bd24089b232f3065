//! Mel filterbank (Slaney scale, area-normalized triangles)

/// Hz below which the Slaney mel scale is linear
const LINEAR_BREAK_HZ: f64 = 1000.0;
const LINEAR_SLOPE: f64 = 200.0 / 3.0;
/// Log step above the break: ln(6.4) / 27
const LOG_STEP: f64 = 0.068_751_777_420_949_12;

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz < LINEAR_BREAK_HZ {
        hz / LINEAR_SLOPE
    } else {
        LINEAR_BREAK_HZ / LINEAR_SLOPE + (hz / LINEAR_BREAK_HZ).ln() / LOG_STEP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    let break_mel = LINEAR_BREAK_HZ / LINEAR_SLOPE;
    if mel < break_mel {
        mel * LINEAR_SLOPE
    } else {
        LINEAR_BREAK_HZ * (LOG_STEP * (mel - break_mel)).exp()
    }
}

/// Triangular filters mapping `n_fft / 2 + 1` linear bins onto `n_mels` bands
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// `weights[band][bin]`
    weights: Vec<Vec<f32>>,
    /// First and one-past-last non-zero bin per band
    spans: Vec<(usize, usize)>,
}

impl MelFilterbank {
    /// Bands spanning 0 Hz to Nyquist
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let num_bins = n_fft / 2 + 1;
        let nyquist = sample_rate as f64 / 2.0;

        let mel_max = hz_to_mel(nyquist);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();
        let bin_hz: Vec<f64> = (0..num_bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let mut weights = Vec::with_capacity(n_mels);
        let mut spans = Vec::with_capacity(n_mels);
        for band in 0..n_mels {
            let (lower, centre, upper) = (edges[band], edges[band + 1], edges[band + 2]);
            let norm = 2.0 / (upper - lower);
            let row: Vec<f32> = bin_hz
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (centre - lower);
                    let falling = (upper - f) / (upper - centre);
                    (rising.min(falling).max(0.0) * norm) as f32
                })
                .collect();
            let first = row.iter().position(|&w| w > 0.0).unwrap_or(0);
            let last = row.iter().rposition(|&w| w > 0.0).map_or(0, |i| i + 1);
            spans.push((first, last.max(first)));
            weights.push(row);
        }

        Self { weights, spans }
    }

    pub fn num_bands(&self) -> usize {
        self.weights.len()
    }

    /// Project one power frame onto the mel bands
    pub fn apply(&self, frame: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(self.spans.iter())
            .map(|(row, &(first, last))| {
                let last = last.min(frame.len());
                (first..last).map(|k| row[k] * frame[k]).sum()
            })
            .collect()
    }
}

/// Convert power to decibels, clipped to `top_db` below the peak
pub fn power_to_db(spec: &mut [Vec<f32>], top_db: f32) {
    let mut peak = f32::NEG_INFINITY;
    for frame in spec.iter_mut() {
        for v in frame.iter_mut() {
            *v = 10.0 * v.max(1e-10).log10();
            peak = peak.max(*v);
        }
    }
    let floor = peak - top_db;
    for frame in spec.iter_mut() {
        for v in frame.iter_mut() {
            *v = v.max(floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_scale_inverse() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 16000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_filterbank_shape() {
        let fb = MelFilterbank::new(44100, 2048, 64);
        assert_eq!(fb.num_bands(), 64);
        let out = fb.apply(&vec![1.0; 1025]);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_power_to_db_floor() {
        let mut spec = vec![vec![1.0, 1e-12], vec![0.1, 0.0]];
        power_to_db(&mut spec, 80.0);
        assert!((spec[0][0] - 0.0).abs() < 1e-6);
        assert!((spec[1][0] + 10.0).abs() < 1e-4);
        assert!((spec[0][1] + 80.0).abs() < 1e-4);
    }
}
