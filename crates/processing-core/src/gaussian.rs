//! One-dimensional Gaussian smoothing.
//!
//! Removes frame-level jitter from motion series and speed curves while
//! keeping their trend. The kernel is truncated at four standard deviations
//! and the signal is extended by half-sample reflection
//! (`d c b a | a b c d | d c b a`), so a constant series stays constant.

/// Kernel extent, in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Normalized kernel weights for `sigma`, centre at index `radius`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Smooth `values` with a Gaussian of standard deviation `sigma` samples.
///
/// A non-positive or non-finite `sigma` returns the input unchanged.
pub fn gaussian_filter1d(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.is_empty() || !(sigma > 0.0) || !sigma.is_finite() {
        return values.to_vec();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let n = values.len();

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * values[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Map an out-of-range index back into `[0, n)` by half-sample reflection.
fn reflect_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}
