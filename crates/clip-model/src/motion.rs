//! Motion measurements produced by the analyzer.

use serde::{Deserialize, Serialize};

/// Motion between one pair of consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    /// Mean per-pixel flow magnitude, uncompensated.
    pub raw_magnitude: f64,
    /// Mean magnitude after removing camera motion, blended with the
    /// camera magnitude.
    pub subject_magnitude: f64,
    /// Magnitude of the median flow vector.
    pub camera_magnitude: f64,
}

/// Ordered motion samples for a clip (n frames produce n − 1 samples).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSeries {
    pub samples: Vec<MotionSample>,
}

impl MotionSeries {
    pub fn new(samples: Vec<MotionSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Uncompensated magnitudes.
    pub fn raw(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.raw_magnitude).collect()
    }

    /// Camera-compensated subject magnitudes.
    pub fn subject(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.subject_magnitude).collect()
    }

    /// Camera magnitudes.
    pub fn camera(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.camera_magnitude).collect()
    }

    pub fn mean_raw(&self) -> f64 {
        mean(self.samples.iter().map(|s| s.raw_magnitude))
    }

    pub fn mean_subject(&self) -> f64 {
        mean(self.samples.iter().map(|s| s.subject_magnitude))
    }

    pub fn mean_camera(&self) -> f64 {
        mean(self.samples.iter().map(|s| s.camera_magnitude))
    }
}

/// Clip-wide noise estimate.
///
/// Diffuse noise such as rain or film grain raises the mean flow magnitude
/// far more than the median, compressing `ratio`. The resulting
/// `noise_factor` discounts motion readings on noisy footage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// Mean over pairs of the per-pair mean magnitude.
    pub mean_of_means: f64,
    /// Mean over pairs of the per-pair median magnitude.
    pub mean_of_medians: f64,
    /// `mean_of_means / mean_of_medians`, or the fallback ratio when the
    /// medians are near zero.
    pub ratio: f64,
    /// Discount in `[0.78, 1.0]`; 1.0 means clean.
    pub noise_factor: f64,
}

impl NoiseProfile {
    /// Profile reported when there is nothing to measure. `ratio` is 0.0
    /// because no pair contributed to it.
    pub fn clean() -> Self {
        Self {
            mean_of_means: 0.0,
            mean_of_medians: 0.0,
            ratio: 0.0,
            noise_factor: 1.0,
        }
    }

    /// Fractional discount applied to motion readings (0.0 for clean).
    pub fn discount(&self) -> f64 {
        1.0 - self.noise_factor
    }
}

impl Default for NoiseProfile {
    fn default() -> Self {
        Self::clean()
    }
}

/// Mean of a sequence; 0.0 when empty.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(raw: f64, subject: f64, camera: f64) -> MotionSample {
        MotionSample {
            raw_magnitude: raw,
            subject_magnitude: subject,
            camera_magnitude: camera,
        }
    }

    #[test]
    fn test_columns_and_means() {
        let series = MotionSeries::new(vec![sample(1.0, 0.5, 0.2), sample(3.0, 1.5, 0.4)]);
        assert_eq!(series.raw(), vec![1.0, 3.0]);
        assert_eq!(series.subject(), vec![0.5, 1.5]);
        assert_eq!(series.camera(), vec![0.2, 0.4]);
        assert_eq!(series.mean_raw(), 2.0);
        assert_eq!(series.mean_subject(), 1.0);
        assert!((series.mean_camera() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_series_means_are_zero() {
        let series = MotionSeries::default();
        assert!(series.is_empty());
        assert_eq!(series.mean_raw(), 0.0);
    }

    #[test]
    fn test_clean_profile() {
        let profile = NoiseProfile::clean();
        assert_eq!(profile.noise_factor, 1.0);
        assert_eq!(profile.discount(), 0.0);
    }
}
