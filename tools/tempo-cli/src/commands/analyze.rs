//! Analyze and plan clips without writing anything.

use std::path::PathBuf;

use tempo_common::config::{Calibration, MediaDefaults};
use tempo_media_io::{FfmpegSource, FrameSource};
use tempo_processing_core::Normalizer;

pub fn run(
    videos: Vec<PathBuf>,
    calibration: Calibration,
    media: &MediaDefaults,
) -> anyhow::Result<()> {
    let source = FfmpegSource::new(media);
    let normalizer = Normalizer::new(calibration);

    for path in videos {
        println!("Analyzing: {}", path.display());

        let clip = match source.decode(&path) {
            Ok(clip) => clip,
            Err(e) => {
                tracing::error!(video = %path.display(), error = %e, "Failed to decode");
                println!("  ERROR: {e}");
                continue;
            }
        };

        let analysis = normalizer.plan_clip(&clip);
        let series = &analysis.motion.series;
        let plan = &analysis.plan;

        println!(
            "  Original: {} frames @ {:.2}fps ({:.2}s)",
            clip.len(),
            analysis.fps,
            clip.duration_secs(analysis.fps)
        );
        println!("  Raw motion: {:.3} px/frame", series.mean_raw());
        println!("  Subject motion: {:.3} px/frame", series.mean_subject());
        println!("  Camera motion: ~{:.3} px/frame", series.mean_camera());
        if analysis.motion.noise.discount() > 0.0 {
            println!(
                "  Noise discount: {:.0}% (ratio {:.2})",
                analysis.motion.noise.discount() * 100.0,
                analysis.motion.noise.ratio
            );
        }
        println!(
            "  Min acceptable ({:.0}fps): {:.3} px/frame",
            analysis.fps,
            calibration.min_acceptable(analysis.fps)
        );
        match plan.tempo {
            Some(tempo) => {
                println!(
                    "  Zone: {} (beginning raw {:.3}, subject {:.3})",
                    tempo.zone, tempo.beginning_raw, tempo.beginning_subject
                );
                println!("  Reference: {:.3} px/frame", tempo.reference_tempo);
            }
            None => println!("  Zone: - (too few frames to plan)"),
        }
        println!("  STATUS: {}", analysis.status);
        println!(
            "  Speed adjustment: avg {:.2}x, range {:.2}x - {:.2}x",
            plan.curve.mean(),
            plan.curve.min(),
            plan.curve.max()
        );
    }

    Ok(())
}
