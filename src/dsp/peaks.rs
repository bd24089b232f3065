//! Local-maximum peak picking with parabolic sub-bin refinement

use std::ops::Range;

/// A refined peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Integer index of the local maximum
    pub index: usize,
    /// Index refined by a parabola through the three neighbouring samples
    pub position: f64,
    /// Height of the fitted parabola at `position`
    pub magnitude: f64,
}

/// Interior indices strictly greater than both neighbours
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    if x.len() < 3 {
        return Vec::new();
    }
    (1..x.len() - 1)
        .filter(|&i| x[i] > x[i - 1] && x[i] > x[i + 1])
        .collect()
}

/// Vertex offset in [-0.5, 0.5] of the parabola through `(y0, y1, y2)`
pub fn parabolic_offset(y0: f64, y1: f64, y2: f64) -> f64 {
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5)
}

/// Refine the peak at index `i` (edge indices are returned as-is)
pub fn refine(x: &[f64], i: usize) -> Peak {
    if i == 0 || i + 1 >= x.len() {
        return Peak {
            index: i,
            position: i as f64,
            magnitude: x[i],
        };
    }
    let (y0, y1, y2) = (x[i - 1], x[i], x[i + 1]);
    let delta = parabolic_offset(y0, y1, y2);
    Peak {
        index: i,
        position: i as f64 + delta,
        magnitude: y1 - 0.25 * (y0 - y2) * delta,
    }
}

/// Up to `k` strongest local maxima of `x[range]`, strongest first
///
/// Falls back to the arg-max of the range when it has no local maximum.
pub fn top_peaks(x: &[f64], range: Range<usize>, k: usize) -> Vec<Peak> {
    let range = range.start.min(x.len())..range.end.min(x.len());
    if range.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut peaks: Vec<Peak> = local_maxima(x)
        .into_iter()
        .filter(|i| range.contains(i))
        .map(|i| refine(x, i))
        .collect();
    if peaks.is_empty() {
        let argmax = range
            .clone()
            .max_by(|&a, &b| x[a].total_cmp(&x[b]))
            .unwrap_or(range.start);
        peaks.push(refine(x, argmax));
    }
    peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    peaks.truncate(k);
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima() {
        let x = [0.0, 1.0, 0.0, 2.0, 1.0, 1.0];
        assert_eq!(local_maxima(&x), vec![1, 3]);
        assert!(local_maxima(&[0.0, 2.0, 2.0, 0.0]).is_empty());
    }

    #[test]
    fn test_parabolic_offset_symmetric() {
        assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
        assert!(parabolic_offset(1.0, 2.0, 1.5) > 0.0);
        assert!(parabolic_offset(1.5, 2.0, 1.0) < 0.0);
    }

    #[test]
    fn test_refine_recovers_true_vertex() {
        // Samples of -(x - 3.3)^2 at integers
        let x: Vec<f64> = (0..7).map(|i| -((i as f64 - 3.3).powi(2))).collect();
        let peak = refine(&x, 3);
        assert!((peak.position - 3.3).abs() < 1e-9);
    }

    #[test]
    fn test_top_peaks_order_and_range() {
        let x = [0.0, 3.0, 0.0, 5.0, 0.0, 4.0, 0.0];
        let peaks = top_peaks(&x, 2..7, 2);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].index, 3);
        assert_eq!(peaks[1].index, 5);
    }

    #[test]
    fn test_top_peaks_falls_back_to_argmax() {
        let x = [5.0, 4.0, 3.0, 2.0, 1.0];
        let peaks = top_peaks(&x, 1..5, 3);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 1);
    }
}
