//! Tempo planning: motion series in, per-sample speed curve out.
//!
//! The clip's opening second sets the target. Its raw motion decides the
//! zone (how hard the clip is retimed), its subject motion becomes the
//! reference tempo every later sample is pulled toward. The curve is
//! clamped, smoothed and ramped in from 1.0 so playback never jumps at
//! the first frame.

use tempo_clip_model::plan::{TempoPlan, TempoZone};
use tempo_clip_model::timeline::SpeedCurve;
use tempo_common::config::Calibration;
use tempo_common::error::{TempoError, TempoResult};

use crate::gaussian::gaussian_filter1d;

/// Everything the planner produced for one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedPlan {
    /// Zone decision; absent when there were too few samples to decide.
    pub tempo: Option<TempoPlan>,
    /// Smoothed subject series the curve was derived from.
    pub smoothed_subject: Vec<f64>,
    /// Per-sample speeds after clamping, before smoothing and ramp-in.
    pub clamped_curve: SpeedCurve,
    /// Final speed curve.
    pub curve: SpeedCurve,
}

impl SpeedPlan {
    fn identity(len: usize, smoothed_subject: Vec<f64>, tempo: Option<TempoPlan>) -> Self {
        Self {
            tempo,
            smoothed_subject,
            clamped_curve: SpeedCurve::identity(len),
            curve: SpeedCurve::identity(len),
        }
    }

    pub fn zone(&self) -> Option<TempoZone> {
        self.tempo.map(|t| t.zone)
    }

    pub fn reference_tempo(&self) -> f64 {
        self.tempo.map(|t| t.reference_tempo).unwrap_or(0.0)
    }
}

/// Builds speed curves from motion series.
#[derive(Debug, Clone, Default)]
pub struct TempoPlanner {
    calibration: Calibration,
}

impl TempoPlanner {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Plan a speed curve, falling back to an identity curve when the
    /// series are too short or carry no usable motion.
    pub fn plan(&self, raw: &[f64], subject: &[f64], fps: f64, noise_factor: f64) -> SpeedPlan {
        match self.build(raw, subject, fps, noise_factor) {
            Ok(plan) => plan,
            Err((err, fallback)) => {
                tracing::warn!(error = %err, "Keeping original timing");
                fallback
            }
        }
    }

    /// Like [`plan`](Self::plan) but reports the fallback cases as errors.
    pub fn try_plan(
        &self,
        raw: &[f64],
        subject: &[f64],
        fps: f64,
        noise_factor: f64,
    ) -> TempoResult<SpeedPlan> {
        self.build(raw, subject, fps, noise_factor)
            .map_err(|(err, _)| err)
    }

    /// Decide zone, reference tempo and correction strength from the
    /// opening tempos.
    pub fn classify_zone(
        &self,
        beginning_raw: f64,
        beginning_subject: f64,
        fps: f64,
        noise_factor: f64,
    ) -> TempoPlan {
        let cal = &self.calibration;
        let zones = &cal.zones;
        let min_acceptable = cal.min_acceptable(fps);
        let borderline_threshold = cal.borderline_threshold(fps);

        let (zone, reference_tempo, correction_strength) = if beginning_raw >= min_acceptable {
            (TempoZone::Fast, beginning_subject, zones.fast_correction)
        } else if beginning_raw >= borderline_threshold {
            let shortfall = 1.0 - beginning_raw / min_acceptable;
            if noise_factor < zones.noise_suspect_factor {
                let boost = 1.0 + shortfall * zones.borderline_boost_slope;
                (
                    TempoZone::Borderline,
                    beginning_subject * boost.min(zones.borderline_max_boost),
                    (zones.borderline_correction + shortfall * zones.borderline_boost_slope)
                        .min(zones.borderline_max_correction),
                )
            } else {
                (
                    TempoZone::Borderline,
                    beginning_subject * zones.borderline_gentle_boost,
                    zones.borderline_correction,
                )
            }
        } else {
            (
                TempoZone::Slow,
                (beginning_subject * zones.slow_subject_multiplier)
                    .max(min_acceptable * zones.slow_floor_multiplier),
                zones.slow_correction,
            )
        };

        TempoPlan {
            zone,
            reference_tempo,
            correction_strength,
            beginning_raw,
            beginning_subject,
            min_acceptable,
            borderline_threshold,
            reference_window: 0,
        }
    }

    /// Speed for one sample given its smoothed subject tempo.
    fn sample_speed(&self, subject: f64, reference: f64, strength: f64) -> f64 {
        let cal = &self.calibration;
        let ratio = subject / reference;
        if ratio == 1.0 {
            return 1.0;
        }
        let needed = reference / (subject + cal.ratio_epsilon);
        let speed = 1.0 + (needed - 1.0) * strength;
        speed.clamp(cal.max_slowdown, cal.max_speedup)
    }

    fn build(
        &self,
        raw: &[f64],
        subject: &[f64],
        fps: f64,
        noise_factor: f64,
    ) -> Result<SpeedPlan, (TempoError, SpeedPlan)> {
        let cal = &self.calibration;
        let n = raw.len().min(subject.len());
        let required = cal.min_samples.max(1);
        if n < required {
            return Err((
                TempoError::InsufficientSamples { count: n, required },
                SpeedPlan::identity(n, subject[..n].to_vec(), None),
            ));
        }

        let smoothed_raw = gaussian_filter1d(&raw[..n], cal.smoothing_sigma);
        let smoothed_subject = gaussian_filter1d(&subject[..n], cal.smoothing_sigma);

        let window = reference_window(fps, n);
        let beginning_raw = window_mean(&smoothed_raw[..window]);
        let beginning_subject = window_mean(&smoothed_subject[..window]);

        let mut tempo = self.classify_zone(beginning_raw, beginning_subject, fps, noise_factor);
        tempo.reference_window = window;

        tracing::debug!(
            zone = %tempo.zone,
            beginning_raw,
            beginning_subject,
            min_acceptable = tempo.min_acceptable,
            reference = tempo.reference_tempo,
            strength = tempo.correction_strength,
            "Tempo zone classified"
        );

        if tempo.reference_tempo < cal.min_reference_tempo {
            return Err((
                TempoError::DegenerateTempo {
                    reference_tempo: tempo.reference_tempo,
                },
                SpeedPlan::identity(n, smoothed_subject, Some(tempo)),
            ));
        }

        let clamped: Vec<f64> = smoothed_subject
            .iter()
            .map(|&s| self.sample_speed(s, tempo.reference_tempo, tempo.correction_strength))
            .collect();

        let mut curve = gaussian_filter1d(&clamped, cal.smoothing_sigma);
        ramp_in(&mut curve, (fps.round().max(0.0) as usize).min(n / 5));

        Ok(SpeedPlan {
            tempo: Some(tempo),
            smoothed_subject,
            clamped_curve: SpeedCurve::new(clamped),
            curve: SpeedCurve::new(curve),
        })
    }
}

/// Number of opening samples averaged for the beginning tempos.
pub fn reference_window(fps: f64, n: usize) -> usize {
    (fps.round().max(0.0) as usize)
        .max(10)
        .min(n / 4)
        .max(1)
}

/// Fade the first `ramp` speeds in from 1.0 along a quadratic.
fn ramp_in(curve: &mut [f64], ramp: usize) {
    if ramp == 0 {
        return;
    }
    for (i, speed) in curve.iter_mut().take(ramp).enumerate() {
        let blend = i as f64 / ramp as f64;
        *speed = 1.0 + (*speed - 1.0) * blend * blend;
    }
}

fn window_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn planner() -> TempoPlanner {
        TempoPlanner::new(Calibration::default())
    }

    #[test]
    fn test_fast_clip_keeps_timing() {
        let series = vec![3.0; 99];
        let plan = planner().try_plan(&series, &series, 24.0, 1.0).unwrap();
        let tempo = plan.tempo.unwrap();
        assert_eq!(tempo.zone, TempoZone::Fast);
        assert_eq!(tempo.correction_strength, 0.5);
        assert_eq!(tempo.reference_window, 24);
        assert_eq!(plan.curve.len(), 99);
        for &speed in plan.curve.values() {
            assert!((speed - 1.0).abs() < 1e-3, "speed {speed}");
        }
    }

    #[test]
    fn test_slow_clip_is_sped_up_to_cap() {
        let series = vec![0.5; 99];
        let plan = planner().try_plan(&series, &series, 24.0, 1.0).unwrap();
        let tempo = plan.tempo.unwrap();
        assert_eq!(tempo.zone, TempoZone::Slow);
        assert!((tempo.reference_tempo - 1.8).abs() < 1e-9);
        assert_eq!(tempo.correction_strength, 0.95);

        let curve = plan.curve.values();
        // Ramp spans min(24, 99 / 5) = 19 samples.
        assert_eq!(curve[0], 1.0);
        assert!(curve[10] > 1.0 && curve[10] < 2.0);
        for &speed in &curve[19..] {
            assert!((speed - 2.0).abs() < 1e-9, "speed {speed}");
        }
    }

    #[test]
    fn test_borderline_noise_suspected_boosts_reference() {
        // 1.35 at 24 fps: 90% of the floor, inside [1.275, 1.5).
        let tempo = planner().classify_zone(1.35, 1.0, 24.0, 0.8);
        assert_eq!(tempo.zone, TempoZone::Borderline);
        let boost = 1.0 + 0.1 * (0.4 / 0.15);
        assert!((tempo.reference_tempo - boost).abs() < 1e-9);
        assert!((tempo.correction_strength - (0.3 + 0.1 * (0.4 / 0.15))).abs() < 1e-9);
    }

    #[test]
    fn test_borderline_boost_stays_within_caps() {
        // Just above the borderline floor the shortfall nears 15%.
        let tempo = planner().classify_zone(1.29, 2.0, 24.0, 0.8);
        assert_eq!(tempo.zone, TempoZone::Borderline);
        assert!(tempo.reference_tempo <= 2.0 * 1.4 + 1e-12);
        assert!(tempo.correction_strength <= 0.7 + 1e-12);
    }

    #[test]
    fn test_borderline_clean_footage_gets_gentle_nudge() {
        let tempo = planner().classify_zone(1.35, 1.0, 24.0, 1.0);
        assert_eq!(tempo.zone, TempoZone::Borderline);
        assert!((tempo.reference_tempo - 1.05).abs() < 1e-12);
        assert_eq!(tempo.correction_strength, 0.3);
    }

    #[test]
    fn test_zone_thresholds_scale_with_fps() {
        // 1.0 px/frame is slow at 24 fps but fast at 48 fps (floor 0.75).
        assert_eq!(planner().classify_zone(1.0, 1.0, 24.0, 1.0).zone, TempoZone::Slow);
        assert_eq!(planner().classify_zone(1.0, 1.0, 48.0, 1.0).zone, TempoZone::Fast);
    }

    #[test]
    fn test_insufficient_samples_returns_identity() {
        let series = vec![0.5; 9];
        let err = planner().try_plan(&series, &series, 24.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            TempoError::InsufficientSamples {
                count: 9,
                required: 10
            }
        ));

        let plan = planner().plan(&series, &series, 24.0, 1.0);
        assert!(plan.tempo.is_none());
        assert!(plan.curve.is_identity());
        assert_eq!(plan.curve.len(), 9);
    }

    #[test]
    fn test_empty_series_never_plans_even_without_sample_minimum() {
        let cal = Calibration {
            min_samples: 0,
            ..Calibration::default()
        };
        let planner = TempoPlanner::new(cal);
        let err = planner.try_plan(&[], &[], 24.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            TempoError::InsufficientSamples {
                count: 0,
                required: 1
            }
        ));

        let plan = planner.plan(&[], &[], 24.0, 1.0);
        assert!(plan.tempo.is_none());
        assert!(plan.curve.is_empty());

        // A single sample still gets a plan once the minimum allows it.
        let plan = planner.plan(&[2.0], &[2.0], 24.0, 1.0);
        assert_eq!(plan.curve.len(), 1);
    }

    #[test]
    fn test_still_subject_in_fast_clip_is_degenerate() {
        // The Slow zone floor keeps the reference positive, so only a
        // Fast clip with a still subject can degenerate.
        let raw = vec![5.0; 40];
        let subject = vec![0.0; 40];
        let err = planner().try_plan(&raw, &subject, 24.0, 1.0).unwrap_err();
        assert!(matches!(err, TempoError::DegenerateTempo { .. }));

        let plan = planner().plan(&raw, &subject, 24.0, 1.0);
        assert!(plan.curve.is_identity());
        assert_eq!(plan.zone(), Some(TempoZone::Fast));
        assert_eq!(plan.smoothed_subject.len(), 40);
    }

    #[test]
    fn test_reference_window() {
        assert_eq!(reference_window(24.0, 99), 24);
        assert_eq!(reference_window(30.0, 60), 15);
        assert_eq!(reference_window(5.0, 200), 10);
        assert_eq!(reference_window(23.976, 400), 24);
    }

    #[test]
    fn test_ramp_starts_at_identity() {
        let mut curve = vec![2.0; 10];
        ramp_in(&mut curve, 4);
        assert_eq!(curve[0], 1.0);
        assert!((curve[2] - 1.25).abs() < 1e-12);
        assert_eq!(curve[4], 2.0);
    }

    proptest! {
        #[test]
        fn prop_clamped_curve_stays_in_bounds(
            subject in proptest::collection::vec(0.0f64..20.0, 10..80),
            fps in 12.0f64..60.0,
            noise in 0.78f64..1.0,
        ) {
            let plan = planner().plan(&subject, &subject, fps, noise);
            for &speed in plan.clamped_curve.values() {
                prop_assert!((0.6..=2.0).contains(&speed));
            }
            for &speed in plan.curve.values() {
                prop_assert!(speed >= 0.6 - 1e-9 && speed <= 2.0 + 1e-9);
            }
        }
    }
}
