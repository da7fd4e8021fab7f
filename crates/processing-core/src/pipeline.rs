//! End-to-end normalization of one decoded clip.
//!
//! analyze → discount noise → plan → resample → classify, with an optional
//! second analysis pass over the output for diagnostics.

use tempo_clip_model::frame::{Clip, Frame};
use tempo_clip_model::motion::{mean, MotionSeries};
use tempo_clip_model::plan::TempoStatus;
use tempo_common::config::Calibration;
use tempo_common::error::TempoError;

use crate::diagnostics::DiagnosticSummary;
use crate::flow::DenseFlowEstimator;
use crate::motion::{MotionAnalysis, MotionAnalyzer};
use crate::planner::{reference_window, SpeedPlan, TempoPlanner};
use crate::resample::FrameResampler;
use crate::status::classify_status;

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Re-analyze the output and compute a [`DiagnosticSummary`].
    pub diagnostics: bool,
}

/// Analysis and plan for one clip, before any frames are touched.
#[derive(Debug, Clone)]
pub struct ClipAnalysis {
    /// Frame rate the thresholds were scaled with.
    pub fps: f64,
    pub motion: MotionAnalysis,
    /// Raw series after the noise discount; what the planner saw.
    pub adjusted_raw: Vec<f64>,
    pub plan: SpeedPlan,
    pub status: TempoStatus,
}

impl ClipAnalysis {
    /// Opening raw tempo the zone and status were decided on.
    pub fn beginning_raw(&self) -> f64 {
        opening_raw(&self.plan, &self.adjusted_raw)
    }

    /// Mean of the unsmoothed subject series over the reference window.
    pub fn beginning_subject(&self) -> f64 {
        let subject = self.motion.series.subject();
        if subject.is_empty() {
            return 0.0;
        }
        let window = reference_window(self.fps, subject.len()).min(subject.len());
        mean(subject[..window].iter().copied())
    }
}

/// Result of normalizing one clip.
#[derive(Debug, Clone)]
pub struct Normalization {
    pub analysis: ClipAnalysis,
    /// Retimed frames, sharing buffers with the input clip.
    pub frames: Vec<Frame>,
    /// Motion of the output, when diagnostics were requested.
    pub after: Option<MotionSeries>,
    pub summary: Option<DiagnosticSummary>,
}

impl Normalization {
    pub fn fps(&self) -> f64 {
        self.analysis.fps
    }
}

/// Runs the full analyze/plan/resample chain with one calibration.
pub struct Normalizer {
    analyzer: MotionAnalyzer,
    planner: TempoPlanner,
    resampler: FrameResampler,
    calibration: Calibration,
}

impl Normalizer {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            analyzer: MotionAnalyzer::new(calibration),
            planner: TempoPlanner::new(calibration),
            resampler: FrameResampler::new(),
            calibration,
        }
    }

    /// Use a specific flow estimator for both analysis passes.
    pub fn with_estimator(estimator: Box<dyn DenseFlowEstimator>, calibration: Calibration) -> Self {
        Self {
            analyzer: MotionAnalyzer::with_estimator(estimator, calibration),
            planner: TempoPlanner::new(calibration),
            resampler: FrameResampler::new(),
            calibration,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Frame rate to scale thresholds with. Untrustworthy probe results
    /// fall back to the reference rate.
    pub fn resolve_fps(&self, fps: f64) -> f64 {
        if self.calibration.is_valid_fps(fps) {
            return fps;
        }
        let err = TempoError::InvalidFps { fps };
        tracing::warn!(
            error = %err,
            fallback = self.calibration.reference_fps,
            "Using reference frame rate"
        );
        self.calibration.reference_fps
    }

    /// Analyze and plan a clip without resampling it.
    pub fn plan_clip(&self, clip: &Clip) -> ClipAnalysis {
        let fps = self.resolve_fps(clip.fps);
        let motion = self.analyzer.analyze(&clip.frames, true);

        let noise_factor = motion.noise_factor();
        let adjusted_raw: Vec<f64> = motion
            .series
            .raw()
            .into_iter()
            .map(|v| v * noise_factor)
            .collect();
        let subject = motion.series.subject();

        let mean_raw = motion.series.mean_raw();
        tracing::info!(
            frames = clip.len(),
            fps,
            duration_secs = clip.duration_secs(fps),
            raw = mean_raw,
            subject = motion.series.mean_subject(),
            camera = motion.series.mean_camera(),
            "Motion measured"
        );
        if noise_factor < self.calibration.zones.noise_suspect_factor {
            tracing::info!(
                discount_pct = motion.noise.discount() * 100.0,
                adjusted_raw = mean_raw * noise_factor,
                "Noise detected"
            );
        }

        let plan = self.planner.plan(&adjusted_raw, &subject, fps, noise_factor);

        let beginning_raw = opening_raw(&plan, &adjusted_raw);
        let status = classify_status(beginning_raw, &subject, fps, &self.calibration);

        tracing::info!(
            min_acceptable = self.calibration.min_acceptable(fps),
            beginning_raw,
            status = %status,
            reference = plan.reference_tempo(),
            avg_speed = plan.curve.mean(),
            min_speed = plan.curve.min(),
            max_speed = plan.curve.max(),
            "Tempo planned"
        );

        ClipAnalysis {
            fps,
            motion,
            adjusted_raw,
            plan,
            status,
        }
    }

    /// Normalize a clip's tempo.
    pub fn normalize(&self, clip: &Clip, options: NormalizeOptions) -> Normalization {
        let analysis = self.plan_clip(clip);
        let frames = self.resampler.resample(&clip.frames, &analysis.plan.curve);

        tracing::info!(
            output_frames = frames.len(),
            duration_secs = frames.len() as f64 / analysis.fps,
            "Frames resampled"
        );

        let (after, summary) = if options.diagnostics {
            let after = self.analyzer.analyze(&frames, true).series;
            let window = reference_window(analysis.fps, analysis.motion.series.len());
            let summary = DiagnosticSummary::compute(
                &analysis.motion.series.subject(),
                &after.subject(),
                &analysis.plan.curve,
                analysis.plan.reference_tempo(),
                analysis.beginning_subject(),
                window,
            )
            .with_frames(clip.len(), frames.len());

            if let (Some(ending), Some(pct)) = (summary.ending_after, summary.ending_after_pct) {
                tracing::info!(
                    ending_after = ending,
                    pct_of_beginning = pct,
                    "Ending after normalization"
                );
            }
            (Some(after), Some(summary))
        } else {
            (None, None)
        };

        Normalization {
            analysis,
            frames,
            after,
            summary,
        }
    }
}

/// Without a zone decision the whole discounted series stands in for the
/// opening.
fn opening_raw(plan: &SpeedPlan, adjusted_raw: &[f64]) -> f64 {
    match plan.tempo {
        Some(tempo) => tempo.beginning_raw,
        None => mean(adjusted_raw.iter().copied()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fps_substitutes_reference_rate() {
        let normalizer = Normalizer::new(Calibration::default());
        assert_eq!(normalizer.resolve_fps(30.0), 30.0);
        assert_eq!(normalizer.resolve_fps(0.0), 24.0);
        assert_eq!(normalizer.resolve_fps(1000.0), 24.0);
        assert_eq!(normalizer.resolve_fps(-5.0), 24.0);
    }

    #[test]
    fn test_tiny_clip_passes_through() {
        let frames: Vec<Frame> = (0..3).map(|_| Frame::solid(16, 16, [9, 9, 9])).collect();
        let clip = Clip::new(frames, 24.0, 16, 16);
        let result = Normalizer::new(Calibration::default()).normalize(&clip, NormalizeOptions::default());

        assert_eq!(result.frames.len(), 3);
        assert!(result.analysis.plan.tempo.is_none());
        assert!(result.analysis.plan.curve.is_identity());
        assert!(result.summary.is_none());
    }

    #[test]
    fn test_single_frame_clip_without_sample_minimum() {
        let calibration = Calibration {
            min_samples: 0,
            ..Calibration::default()
        };
        let clip = Clip::new(vec![Frame::solid(16, 16, [9, 9, 9])], 24.0, 16, 16);
        let result = Normalizer::new(calibration).normalize(&clip, NormalizeOptions::default());

        assert_eq!(result.frames.len(), 1);
        assert!(result.analysis.plan.tempo.is_none());
        assert!(result.analysis.plan.curve.is_empty());
    }
}
