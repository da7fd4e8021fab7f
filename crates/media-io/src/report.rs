//! Per-clip analysis reports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tempo_clip_model::motion::{MotionSeries, NoiseProfile};
use tempo_clip_model::plan::{TempoPlan, TempoStatus};
use tempo_clip_model::timeline::SpeedCurve;
use tempo_common::error::{TempoError, TempoResult};
use tempo_processing_core::diagnostics::DiagnosticSummary;
use tempo_processing_core::Normalization;

/// Everything known about one normalized clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    /// Source file.
    pub source: PathBuf,
    pub fps: f64,
    pub input_frames: usize,
    pub output_frames: usize,
    pub status: TempoStatus,
    /// Zone decision; absent when the clip was too short to plan.
    pub tempo: Option<TempoPlan>,
    pub noise: NoiseProfile,
    pub summary: Option<DiagnosticSummary>,
    pub speed_curve: SpeedCurve,
    pub motion_before: MotionSeries,
    pub motion_after: Option<MotionSeries>,
}

impl AnalysisReport {
    pub fn from_normalization(
        source: &Path,
        input_frames: usize,
        normalization: &Normalization,
    ) -> Self {
        let analysis = &normalization.analysis;
        Self {
            generated_at: Utc::now(),
            source: source.to_path_buf(),
            fps: analysis.fps,
            input_frames,
            output_frames: normalization.frames.len(),
            status: analysis.status,
            tempo: analysis.plan.tempo,
            noise: analysis.motion.noise,
            summary: normalization.summary.clone(),
            speed_curve: analysis.plan.curve.clone(),
            motion_before: analysis.motion.series.clone(),
            motion_after: normalization.after.clone(),
        }
    }

    /// Reference tempo the curve targets, 0 when none was chosen.
    pub fn reference_tempo(&self) -> f64 {
        self.tempo.map(|t| t.reference_tempo).unwrap_or(0.0)
    }
}

/// Trait for report writers.
pub trait DiagnosticReporter: Send + Sync {
    /// Write the report and return the artifact path.
    fn report(&self, report: &AnalysisReport) -> TempoResult<PathBuf>;

    /// Reporter name.
    fn name(&self) -> &str;
}

/// Writes `<stem>_analysis.json` next to the normalized clips.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Where the report for `source` is written.
    pub fn report_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        self.output_dir.join(format!("{stem}_analysis.json"))
    }
}

impl DiagnosticReporter for JsonReporter {
    fn report(&self, report: &AnalysisReport) -> TempoResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.report_path(&report.source);
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| TempoError::report(format!("Failed to serialize report: {e}")))?;
        std::fs::write(&path, json)?;

        tracing::debug!(report = %path.display(), "Analysis report written");
        Ok(path)
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_clip_model::plan::TempoTrend;

    fn sample_report(source: &str) -> AnalysisReport {
        AnalysisReport {
            generated_at: Utc::now(),
            source: PathBuf::from(source),
            fps: 24.0,
            input_frames: 3,
            output_frames: 3,
            status: TempoStatus::Good(TempoTrend::Steady),
            tempo: None,
            noise: NoiseProfile::clean(),
            summary: None,
            speed_curve: SpeedCurve::identity(2),
            motion_before: MotionSeries::default(),
            motion_after: None,
        }
    }

    #[test]
    fn test_report_path_uses_stem() {
        let reporter = JsonReporter::new("/out");
        assert_eq!(
            reporter.report_path(Path::new("/videos/shot_01.mp4")),
            PathBuf::from("/out/shot_01_analysis.json")
        );
    }

    #[test]
    fn test_json_report_is_written_and_readable() {
        let dir = std::env::temp_dir().join("tempo_test_report");
        let _ = std::fs::remove_dir_all(&dir);

        let reporter = JsonReporter::new(&dir);
        let path = reporter.report(&sample_report("clip.mp4")).unwrap();
        assert_eq!(path, dir.join("clip_analysis.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: AnalysisReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.status, TempoStatus::Good(TempoTrend::Steady));
        assert_eq!(parsed.speed_curve, SpeedCurve::identity(2));
        assert_eq!(parsed.reference_tempo(), 0.0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
