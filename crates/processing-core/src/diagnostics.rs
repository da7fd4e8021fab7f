//! Before/after statistics for a normalized clip.

use serde::{Deserialize, Serialize};

use tempo_clip_model::motion::mean;
use tempo_clip_model::timeline::SpeedCurve;

/// Beginning-relative share (percent) inside which a clip counts as
/// consistent in batch summaries.
const CONSISTENT_RANGE: std::ops::Range<f64> = 85.0..115.0;

/// Numbers comparing a clip's subject motion before and after retiming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub mean_before: f64,
    pub mean_after: f64,
    /// Coefficient of variation, percent.
    pub cv_before: f64,
    pub cv_after: f64,
    /// Mean as percent of the reference tempo.
    pub pct_reference_before: f64,
    pub pct_reference_after: f64,
    pub input_frames: usize,
    pub output_frames: usize,
    pub avg_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Mean of the last reference window after retiming, when the output
    /// spans at least two windows.
    pub ending_after: Option<f64>,
    /// `ending_after` as percent of the original beginning subject tempo.
    pub ending_after_pct: Option<f64>,
}

impl DiagnosticSummary {
    /// Compare the subject series of the input (`before`) and output
    /// (`after`) of one clip.
    pub fn compute(
        before: &[f64],
        after: &[f64],
        curve: &SpeedCurve,
        reference_tempo: f64,
        beginning_subject: f64,
        window: usize,
    ) -> Self {
        let mean_before = mean(before.iter().copied());
        let mean_after = mean(after.iter().copied());

        let ending_after = (window > 0 && after.len() >= window * 2)
            .then(|| mean(after[after.len() - window..].iter().copied()));
        let ending_after_pct = ending_after
            .filter(|_| beginning_subject > 0.0)
            .map(|ending| ending / beginning_subject * 100.0);

        Self {
            mean_before,
            mean_after,
            cv_before: coefficient_of_variation(before),
            cv_after: coefficient_of_variation(after),
            pct_reference_before: percent_of(mean_before, reference_tempo),
            pct_reference_after: percent_of(mean_after, reference_tempo),
            input_frames: before.len() + 1,
            output_frames: after.len() + 1,
            avg_speed: curve.mean(),
            min_speed: curve.min(),
            max_speed: curve.max(),
            ending_after,
            ending_after_pct,
        }
    }

    /// Override the frame counts derived from the series lengths.
    pub fn with_frames(mut self, input_frames: usize, output_frames: usize) -> Self {
        self.input_frames = input_frames;
        self.output_frames = output_frames;
        self
    }

    /// One-word verdict on the input clip relative to its reference.
    pub fn consistency(&self) -> &'static str {
        if CONSISTENT_RANGE.contains(&self.pct_reference_before) {
            "consistent"
        } else if self.pct_reference_before < CONSISTENT_RANGE.start {
            "slows down"
        } else {
            "speeds up"
        }
    }
}

fn percent_of(value: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        value / reference * 100.0
    } else {
        100.0
    }
}

/// Population standard deviation over mean, percent. Zero for an empty or
/// motionless series.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values.iter().copied());
    if !(m > 0.0) {
        return 0.0;
    }
    let variance = mean(values.iter().map(|v| (v - m) * (v - m)));
    variance.sqrt() / m * 100.0
}
