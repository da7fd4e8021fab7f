//! Per-clip status line.
//!
//! Reporting only: the planner makes its own zone decision with a
//! different borderline fraction.

use tempo_clip_model::plan::{TempoStatus, TempoTrend};
use tempo_common::config::Calibration;

use crate::planner::reference_window;

/// Classify a clip from its opening raw tempo and unsmoothed subject series.
pub fn classify_status(
    beginning_raw: f64,
    subject: &[f64],
    fps: f64,
    calibration: &Calibration,
) -> TempoStatus {
    let min_acceptable = calibration.min_acceptable(fps);
    if beginning_raw < min_acceptable * calibration.status.slow_ratio {
        return TempoStatus::Slow;
    }
    if beginning_raw < min_acceptable {
        return TempoStatus::Borderline;
    }
    TempoStatus::Good(trend(subject, fps, calibration))
}

/// Compare the last reference window of `subject` to the first.
pub fn trend(subject: &[f64], fps: f64, calibration: &Calibration) -> TempoTrend {
    if subject.is_empty() {
        return TempoTrend::Steady;
    }
    let window = reference_window(fps, subject.len()).min(subject.len());
    let start = mean(&subject[..window]);
    let end = mean(&subject[subject.len() - window..]);
    if !(start > 0.0) {
        return TempoTrend::Steady;
    }

    let ratio = end / start;
    if ratio > calibration.status.rising_ratio {
        TempoTrend::SpeedsUp
    } else if ratio < calibration.status.falling_ratio {
        TempoTrend::SlowsDown
    } else {
        TempoTrend::Steady
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
