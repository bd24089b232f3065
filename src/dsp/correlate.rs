//! FFT-accelerated correlation and normalization helpers
//!
//! Inputs are `f32` envelopes; arithmetic is done in `f64`.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Autocorrelation `r[lag] = sum_n x[n] x[n + lag]` for `lag` in `0..=max_lag`
///
/// Computed as `IFFT(|FFT(x)|^2)` with enough zero padding to avoid wrap-around.
pub fn autocorrelate(x: &[f32], max_lag: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let size = (2 * n).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);

    let mut buffer: Vec<Complex<f64>> = x
        .iter()
        .map(|&v| Complex::new(v as f64, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(size)
        .collect();
    fft.process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    ifft.process(&mut buffer);

    let scale = 1.0 / size as f64;
    buffer
        .iter()
        .take(max_lag.min(n - 1) + 1)
        .map(|c| c.re * scale)
        .collect()
}

/// Lag `k` maximizing `sum_n a[n] b[n + k]`, and the correlation value there
///
/// Positive `k` means events in `b` happen `k` frames later than in `a`.
/// Returns `None` when either input is empty.
pub fn best_lag(a: &[f32], b: &[f32]) -> Option<(isize, f64)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let size = (a.len() + b.len()).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(size);
    let ifft = planner.plan_fft_inverse(size);

    let padded = |x: &[f32]| -> Vec<Complex<f64>> {
        x.iter()
            .map(|&v| Complex::new(v as f64, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(size)
            .collect()
    };
    let mut fa = padded(a);
    let mut fb = padded(b);
    fft.process(&mut fa);
    fft.process(&mut fb);

    let mut cross: Vec<Complex<f64>> = fa.iter().zip(fb.iter()).map(|(x, y)| x.conj() * y).collect();
    ifft.process(&mut cross);

    // Index i holds lag i for i < b.len(), lag i - size for the wrapped tail
    let mut best: Option<(isize, f64)> = None;
    for (i, c) in cross.iter().enumerate() {
        let lag = if i < b.len() {
            i as isize
        } else if i > size - a.len() {
            i as isize - size as isize
        } else {
            continue;
        };
        let value = c.re / size as f64;
        if best.map_or(true, |(_, v)| value > v) {
            best = Some((lag, value));
        }
    }
    best
}

/// Pearson correlation over the common prefix; 0 when either side is flat
pub fn pearson(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Zero-mean, unit-variance copy (zero-mean only when the variance vanishes)
pub fn zscore(x: &[f32]) -> Vec<f32> {
    if x.is_empty() {
        return Vec::new();
    }
    let n = x.len() as f64;
    let mean = x.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = x.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    let scale = if std > 1e-12 { 1.0 / std } else { 1.0 };
    x.iter().map(|&v| ((v as f64 - mean) * scale) as f32).collect()
}

/// Copy with the mean removed
pub fn remove_mean(x: &[f32]) -> Vec<f32> {
    if x.is_empty() {
        return Vec::new();
    }
    let mean = x.iter().map(|&v| v as f64).sum::<f64>() / x.len() as f64;
    x.iter().map(|&v| (v as f64 - mean) as f32).collect()
}
