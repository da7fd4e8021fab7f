//! Motion analysis: frames in, motion series and noise profile out.
//!
//! Each consecutive frame pair yields one [`MotionSample`]:
//!
//! - **Raw** magnitude: mean per-pixel flow magnitude.
//! - **Camera** magnitude: length of the median flow vector. The median is
//!   robust to a minority of differently moving foreground pixels, so it
//!   tracks pans and shakes.
//! - **Subject** magnitude: mean magnitude after subtracting the camera
//!   vector, blended with the camera magnitude. Pure subtraction erases
//!   pans where the tracked subject itself carries the camera motion.
//!
//! Pairs are independent and analysed in parallel. The clip-wide noise
//! profile is reduced afterwards from the per-pair mean and median
//! magnitudes.

use rayon::prelude::*;

use tempo_clip_model::frame::Frame;
use tempo_clip_model::motion::{MotionSample, MotionSeries, NoiseProfile};
use tempo_common::config::{Calibration, NoiseCalibration};

use crate::flow::{DenseFlowEstimator, FlowField, PyramidalLucasKanade};

/// Motion series plus the noise profile of one clip.
#[derive(Debug, Clone, Default)]
pub struct MotionAnalysis {
    pub series: MotionSeries,
    pub noise: NoiseProfile,
}

impl MotionAnalysis {
    pub fn noise_factor(&self) -> f64 {
        self.noise.noise_factor
    }
}

/// Statistics of a single frame pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairMotion {
    pub sample: MotionSample,
    /// Mean per-pixel magnitude.
    pub mean_magnitude: f64,
    /// Median per-pixel magnitude.
    pub median_magnitude: f64,
}

/// Converts frames into motion series.
pub struct MotionAnalyzer {
    estimator: Box<dyn DenseFlowEstimator>,
    calibration: Calibration,
}

impl MotionAnalyzer {
    /// Create an analyzer using the default dense flow estimator.
    pub fn new(calibration: Calibration) -> Self {
        Self::with_estimator(Box::new(PyramidalLucasKanade::default()), calibration)
    }

    /// Create an analyzer around a specific flow estimator.
    pub fn with_estimator(estimator: Box<dyn DenseFlowEstimator>, calibration: Calibration) -> Self {
        Self {
            estimator,
            calibration,
        }
    }

    pub fn estimator_name(&self) -> &str {
        self.estimator.name()
    }

    /// Analyze an ordered frame sequence.
    ///
    /// Fewer than two frames produce an empty series and a clean profile.
    pub fn analyze(&self, frames: &[Frame], compensate_camera: bool) -> MotionAnalysis {
        if frames.len() < 2 {
            return MotionAnalysis::default();
        }

        let started = std::time::Instant::now();
        let lumas: Vec<_> = frames.par_iter().map(Frame::luma).collect();
        let pairs: Vec<PairMotion> = lumas
            .par_windows(2)
            .map(|pair| {
                let flow = self.estimator.estimate(&pair[0], &pair[1]);
                measure_pair(&flow, compensate_camera, self.calibration.camera_blend)
            })
            .collect();

        let noise = noise_profile(&pairs, &self.calibration.noise);
        let series = MotionSeries::new(pairs.iter().map(|p| p.sample).collect());

        tracing::debug!(
            estimator = self.estimator.name(),
            pairs = pairs.len(),
            compensate_camera,
            ratio = noise.ratio,
            noise_factor = noise.noise_factor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Motion analysis finished"
        );

        MotionAnalysis { series, noise }
    }
}

/// Reduce one flow field to a motion sample.
///
/// Without compensation the subject magnitude equals the raw magnitude
/// and the camera magnitude is zero.
pub fn measure_pair(flow: &FlowField, compensate_camera: bool, camera_blend: f64) -> PairMotion {
    if flow.is_empty() {
        return PairMotion {
            sample: MotionSample::default(),
            mean_magnitude: 0.0,
            median_magnitude: 0.0,
        };
    }

    let mut magnitudes = flow.magnitudes();
    let mean_magnitude = mean_f32(&magnitudes);
    let median_magnitude = median_in_place(&mut magnitudes);

    let sample = if compensate_camera {
        let median_dx = median_in_place(&mut flow.dx().to_vec());
        let median_dy = median_in_place(&mut flow.dy().to_vec());
        let camera_magnitude = median_dx.hypot(median_dy);

        let subject_energy = flow
            .dx()
            .iter()
            .zip(flow.dy())
            .map(|(&dx, &dy)| (dx as f64 - median_dx).hypot(dy as f64 - median_dy))
            .sum::<f64>()
            / flow.len() as f64;

        MotionSample {
            raw_magnitude: mean_magnitude,
            subject_magnitude: subject_energy * camera_blend
                + camera_magnitude * (1.0 - camera_blend),
            camera_magnitude,
        }
    } else {
        MotionSample {
            raw_magnitude: mean_magnitude,
            subject_magnitude: mean_magnitude,
            camera_magnitude: 0.0,
        }
    };

    PairMotion {
        sample,
        mean_magnitude,
        median_magnitude,
    }
}

/// Clip-wide noise profile from per-pair statistics.
pub fn noise_profile(pairs: &[PairMotion], calibration: &NoiseCalibration) -> NoiseProfile {
    if pairs.is_empty() {
        return NoiseProfile::clean();
    }

    let count = pairs.len() as f64;
    let mean_of_means = pairs.iter().map(|p| p.mean_magnitude).sum::<f64>() / count;
    let mean_of_medians = pairs.iter().map(|p| p.median_magnitude).sum::<f64>() / count;

    let ratio = if mean_of_medians > calibration.min_median {
        mean_of_means / mean_of_medians
    } else {
        calibration.fallback_ratio
    };

    NoiseProfile {
        mean_of_means,
        mean_of_medians,
        ratio,
        noise_factor: noise_factor_for_ratio(ratio, calibration),
    }
}

/// Map a mean/median ratio to a noise factor.
///
/// Clean footage (ratio at or above `clean_ratio`) gets 1.0; the factor
/// falls linearly to `1 - max_discount` at `noisy_ratio` and stays there.
pub fn noise_factor_for_ratio(ratio: f64, calibration: &NoiseCalibration) -> f64 {
    let min_factor = calibration.min_factor();
    if ratio >= calibration.clean_ratio {
        1.0
    } else if ratio >= calibration.noisy_ratio {
        let slope = calibration.max_discount / (calibration.clean_ratio - calibration.noisy_ratio);
        (min_factor + (ratio - calibration.noisy_ratio) * slope).clamp(min_factor, 1.0)
    } else {
        min_factor
    }
}

fn mean_f32(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Median with the two middle values averaged for even lengths.
/// Reorders `values`.
fn median_in_place(values: &mut [f32]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    let (below, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper as f64;
    if n % 2 == 1 {
        return upper;
    }
    let lower = below
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    (lower + upper) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Returns the same field for every pair.
    struct FixedFlow(FlowField);

    impl DenseFlowEstimator for FixedFlow {
        fn estimate(&self, _prev: &image::GrayImage, _next: &image::GrayImage) -> FlowField {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// 4×2 field: six background pixels panning by (1, 0), two foreground
    /// pixels moving by (3, 0).
    fn pan_with_subject() -> FlowField {
        FlowField::from_components(
            4,
            2,
            vec![1.0, 1.0, 1.0, 3.0, 1.0, 1.0, 1.0, 3.0],
            vec![0.0; 8],
        )
        .unwrap()
    }

    fn frames(count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::solid(4, 2, [i as u8, 0, 0]))
            .collect()
    }

    #[test]
    fn test_compensated_sample_blends_subject_and_camera() {
        let pair = measure_pair(&pan_with_subject(), true, 0.5);
        assert!((pair.sample.raw_magnitude - 1.5).abs() < 1e-9);
        assert!((pair.sample.camera_magnitude - 1.0).abs() < 1e-9);
        // Subject energy: 2 of 8 pixels at distance 2 => 0.5.
        assert!((pair.sample.subject_magnitude - 0.75).abs() < 1e-9);
        assert!((pair.median_magnitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_uncompensated_sample_uses_raw_magnitude() {
        let pair = measure_pair(&pan_with_subject(), false, 0.5);
        assert_eq!(pair.sample.subject_magnitude, pair.sample.raw_magnitude);
        assert_eq!(pair.sample.camera_magnitude, 0.0);
    }

    #[test]
    fn test_pure_pan_keeps_half_the_camera_term() {
        let pair = measure_pair(&FlowField::uniform(8, 8, 0.0, 2.0), true, 0.5);
        assert!((pair.sample.camera_magnitude - 2.0).abs() < 1e-9);
        assert!((pair.sample.subject_magnitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_produces_one_sample_per_pair() {
        let analyzer = MotionAnalyzer::with_estimator(
            Box::new(FixedFlow(pan_with_subject())),
            Calibration::default(),
        );
        let analysis = analyzer.analyze(&frames(6), true);
        assert_eq!(analysis.series.len(), 5);
        assert!((analysis.series.mean_raw() - 1.5).abs() < 1e-9);
        // mean/median = 1.5 => maximum discount.
        assert!((analysis.noise.ratio - 1.5).abs() < 1e-9);
        assert!((analysis.noise_factor() - 0.78).abs() < 1e-9);
    }

    #[test]
    fn test_fewer_than_two_frames_is_empty_and_clean() {
        let analyzer = MotionAnalyzer::new(Calibration::default());
        let analysis = analyzer.analyze(&frames(1), true);
        assert!(analysis.series.is_empty());
        assert_eq!(analysis.noise_factor(), 1.0);
        assert!(analyzer.analyze(&[], false).series.is_empty());
    }

    #[test]
    fn test_static_frames_fall_back_to_clean_ratio() {
        let analyzer = MotionAnalyzer::new(Calibration::default());
        let still: Vec<Frame> = (0..4).map(|_| Frame::solid(24, 24, [60, 60, 60])).collect();
        let analysis = analyzer.analyze(&still, true);
        assert_eq!(analysis.series.len(), 3);
        assert_eq!(analysis.series.mean_raw(), 0.0);
        assert_eq!(analysis.noise.ratio, 5.0);
        assert_eq!(analysis.noise_factor(), 1.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median_in_place(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_in_place(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median_in_place(&mut []), 0.0);
    }

    #[test]
    fn test_noise_factor_reference_points() {
        let cal = NoiseCalibration::default();
        assert_eq!(noise_factor_for_ratio(3.0, &cal), 1.0);
        assert_eq!(noise_factor_for_ratio(10.0, &cal), 1.0);
        assert!((noise_factor_for_ratio(1.5, &cal) - 0.78).abs() < 1e-12);
        assert!((noise_factor_for_ratio(0.4, &cal) - 0.78).abs() < 1e-12);
        assert!((noise_factor_for_ratio(2.25, &cal) - 0.89).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_noise_factor_is_bounded(ratio in 0.0f64..20.0) {
            let factor = noise_factor_for_ratio(ratio, &NoiseCalibration::default());
            prop_assert!((0.78..=1.0).contains(&factor));
        }

        #[test]
        fn prop_noise_factor_is_monotonic(a in 1.0f64..4.0, b in 1.0f64..4.0) {
            let cal = NoiseCalibration::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(noise_factor_for_ratio(lo, &cal) <= noise_factor_for_ratio(hi, &cal));
        }
    }
}
