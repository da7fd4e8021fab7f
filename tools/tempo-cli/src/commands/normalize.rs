//! Normalize a batch of clips.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use tempo_clip_model::plan::TempoStatus;
use tempo_common::config::{Calibration, MediaDefaults};
use tempo_common::error::TempoResult;
use tempo_media_io::report::{AnalysisReport, DiagnosticReporter, JsonReporter};
use tempo_media_io::{
    write_comparison, ComparisonLabels, FfmpegSink, FfmpegSource, FrameSource, VideoSink,
};
use tempo_processing_core::{NormalizeOptions, Normalizer};

/// Output options for a normalize run.
#[derive(Debug, Clone)]
pub struct NormalizeArgs {
    pub output_dir: PathBuf,
    pub comparison: bool,
    pub report: bool,
    pub jobs: usize,
}

/// What one clip produced.
#[derive(Debug, Clone)]
struct ClipOutcome {
    name: String,
    status: TempoStatus,
    /// Mean subject tempo as percent of the reference, when measured.
    pct_before: Option<f64>,
    consistency: Option<&'static str>,
    avg_speed: f64,
    input_frames: usize,
    output_frames: usize,
}

pub async fn run(
    videos: Vec<PathBuf>,
    args: NormalizeArgs,
    calibration: Calibration,
    media: MediaDefaults,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.output_dir).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create output directory {}: {e}",
            args.output_dir.display()
        )
    })?;

    println!("{}", "=".repeat(60));
    println!("Tempo normalizer");
    println!(
        "Minimum: {:.1} px/frame @ {:.0}fps (scales with FPS)",
        calibration.min_tempo_baseline, calibration.reference_fps
    );
    if args.comparison {
        println!("Comparison mode: ON (side-by-side videos)");
    }
    println!("{}", "=".repeat(60));
    println!("Found {} videos", videos.len());

    let jobs = args.jobs.max(1);
    let semaphore = Arc::new(Semaphore::new(jobs));
    let args = Arc::new(args);
    let media = Arc::new(media);
    let mut tasks = JoinSet::new();

    for (index, video) in videos.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let args = args.clone();
        let media = media.clone();
        tasks.spawn(async move {
            let permit = semaphore.acquire_owned().await;
            let path = video.clone();
            let result = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                process_video(&video, &args, calibration, &media)
            })
            .await;
            (index, path, result)
        });
    }

    let mut outcomes = Vec::new();
    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (index, path, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(error = %e, "Normalize task aborted");
                failures += 1;
                continue;
            }
        };
        match result {
            Ok(Ok(outcome)) => outcomes.push((index, outcome)),
            Ok(Err(e)) => {
                failures += 1;
                tracing::error!(video = %path.display(), error = %e, "Failed to normalize");
                println!("  ERROR: {}: {e}", path.display());
            }
            Err(e) => {
                failures += 1;
                tracing::error!(video = %path.display(), error = %e, "Worker panicked");
                println!("  ERROR: {}: {e}", path.display());
            }
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    print_summary(&outcomes, &args.output_dir, jobs);
    if failures > 0 {
        println!("{failures} video(s) failed");
    }
    Ok(())
}

fn process_video(
    path: &Path,
    args: &NormalizeArgs,
    calibration: Calibration,
    media: &MediaDefaults,
) -> TempoResult<ClipOutcome> {
    let source = FfmpegSource::new(media);
    let sink = FfmpegSink::new(media);

    let clip = source.decode(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    tracing::info!(
        video = %stem,
        frames = clip.len(),
        fps = clip.fps,
        "Processing video"
    );

    let normalizer = Normalizer::new(calibration);
    let result = normalizer.normalize(
        &clip,
        NormalizeOptions {
            diagnostics: args.report,
        },
    );
    let fps = result.fps();

    let normalized_path = args.output_dir.join(format!("{stem}_normalized.mp4"));
    sink.encode(&result.frames, &normalized_path, fps, clip.width, clip.height)?;

    if args.comparison {
        let comparison_path = args.output_dir.join(format!("{stem}_comparison.mp4"));
        let labels = ComparisonLabels::find(media.label_font.as_deref());
        write_comparison(
            &sink,
            &clip.frames,
            &result.frames,
            labels.as_ref(),
            &comparison_path,
            fps,
        )?;
    }

    if args.report {
        let report = AnalysisReport::from_normalization(path, clip.len(), &result);
        JsonReporter::new(&args.output_dir).report(&report)?;
    }

    Ok(ClipOutcome {
        name: short_name(&stem),
        status: result.analysis.status,
        pct_before: result.summary.as_ref().map(|s| s.pct_reference_before),
        consistency: result.summary.as_ref().map(|s| s.consistency()),
        avg_speed: result.analysis.plan.curve.mean(),
        input_frames: clip.len(),
        output_frames: result.frames.len(),
    })
}

/// Last twelve characters of a file stem.
fn short_name(stem: &str) -> String {
    let count = stem.chars().count();
    stem.chars().skip(count.saturating_sub(12)).collect()
}

fn print_summary(outcomes: &[(usize, ClipOutcome)], output_dir: &Path, jobs: usize) {
    println!();
    println!("{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    println!(
        "{:<15} {:<22} {:<10} {}",
        "Video", "vs Reference", "Frames", "Status"
    );
    println!("{}", "-".repeat(60));

    for (_, outcome) in outcomes {
        let relative = match (outcome.pct_before, outcome.consistency) {
            (Some(pct), Some(label)) => format!("{pct:.0}% ({label})"),
            _ => "-".to_string(),
        };
        println!(
            "{:<15} {:<22} {:<10} avg {:.2}x  {}",
            outcome.name,
            relative,
            format!("{}→{}", outcome.input_frames, outcome.output_frames),
            outcome.avg_speed,
            outcome.status
        );
    }

    println!();
    println!("Outputs: {}/", output_dir.display());
    tracing::debug!(jobs, clips = outcomes.len(), "Batch finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_keeps_tail() {
        assert_eq!(short_name("clip"), "clip");
        assert_eq!(short_name("very_long_video_name_01"), "ideo_name_01");
    }
}
