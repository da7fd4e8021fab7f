//! Speed curves and the retimed input-time axis.

use serde::{Deserialize, Serialize};

use crate::motion::mean;

/// Per-sample playback speed multipliers.
///
/// `1.0` keeps the original pace, `2.0` plays twice as fast, `0.6` slows
/// playback down.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeedCurve(Vec<f64>);

impl SpeedCurve {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// A curve that leaves timing untouched.
    pub fn identity(len: usize) -> Self {
        Self(vec![1.0; len])
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f64> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn mean(&self) -> f64 {
        mean(self.0.iter().copied())
    }

    /// Smallest multiplier; 1.0 for an empty curve.
    pub fn min(&self) -> f64 {
        if self.0.is_empty() {
            return 1.0;
        }
        self.0.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest multiplier; 1.0 for an empty curve.
    pub fn max(&self) -> f64 {
        if self.0.is_empty() {
            return 1.0;
        }
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().all(|&v| v == 1.0)
    }
}

impl From<Vec<f64>> for SpeedCurve {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Input-time axis built from a speed curve plus the output sample times.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResampledTimeline {
    /// `cumulative[0] = 0`, `cumulative[k] = sum of 1/speed[i] for i < k`.
    /// Strictly increasing for positive speeds.
    pub cumulative: Vec<f64>,
    /// Evenly spaced over `[0, total_time]`.
    pub output_times: Vec<f64>,
}

impl ResampledTimeline {
    /// Last value of the cumulative axis.
    pub fn total_time(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn output_len(&self) -> usize {
        self.output_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_stats() {
        let curve = SpeedCurve::new(vec![0.6, 1.0, 2.0]);
        assert!((curve.mean() - 1.2).abs() < 1e-12);
        assert_eq!(curve.min(), 0.6);
        assert_eq!(curve.max(), 2.0);
        assert!(!curve.is_identity());
        assert!(SpeedCurve::identity(5).is_identity());
    }

    #[test]
    fn test_empty_curve_stats_are_neutral() {
        let curve = SpeedCurve::default();
        assert_eq!(curve.min(), 1.0);
        assert_eq!(curve.max(), 1.0);
        assert_eq!(curve.mean(), 0.0);
    }

    #[test]
    fn test_curve_serializes_as_plain_array() {
        let json = serde_json::to_string(&SpeedCurve::new(vec![1.0, 1.5])).unwrap();
        assert_eq!(json, "[1.0,1.5]");
    }

    #[test]
    fn test_timeline_total_time() {
        let timeline = ResampledTimeline {
            cumulative: vec![0.0, 0.5, 1.0],
            output_times: vec![0.0, 1.0],
        };
        assert_eq!(timeline.total_time(), 1.0);
        assert_eq!(timeline.output_len(), 2);
    }
}
