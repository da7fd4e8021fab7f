//! Tempo CLI — normalize the perceived motion tempo of video clips.
//!
//! Usage:
//!   tempo normalize <VIDEOS>...  Retime clips toward a consistent tempo
//!   tempo analyze <VIDEOS>...    Show zone, status and planned speeds
//!   tempo check                  Check ffmpeg/ffprobe availability
//!   tempo config                 Show (or write) the effective configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tempo_common::config::{AppConfig, Calibration};

mod commands;

#[derive(Parser)]
#[command(
    name = "tempo",
    about = "Video tempo normalizer: evens out perceived motion speed across clips",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retime clips and write normalized videos
    Normalize {
        /// Video files to process
        #[arg(required = true)]
        videos: Vec<PathBuf>,

        /// Output directory (defaults to the configured output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write side-by-side comparison videos
        #[arg(short, long)]
        comparison: bool,

        /// Skip the JSON analysis report
        #[arg(long)]
        no_report: bool,

        /// Number of clips processed concurrently
        #[arg(long, default_value = "1")]
        jobs: usize,

        #[command(flatten)]
        calibration: CalibrationArgs,
    },

    /// Analyze and plan clips without writing video
    Analyze {
        /// Video files to analyze
        #[arg(required = true)]
        videos: Vec<PathBuf>,

        #[command(flatten)]
        calibration: CalibrationArgs,
    },

    /// Check ffmpeg/ffprobe availability
    Check,

    /// Print the effective configuration
    Config {
        /// Write the configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

/// Calibration overrides shared by the processing commands.
#[derive(Args, Debug, Clone, Default)]
pub struct CalibrationArgs {
    /// Minimum acceptable tempo at the reference frame rate (px/frame)
    #[arg(long)]
    min_tempo: Option<f64>,

    /// Frame rate the minimum tempo was measured at
    #[arg(long)]
    reference_fps: Option<f64>,

    /// Largest per-sample speed-up
    #[arg(long)]
    max_speedup: Option<f64>,

    /// Smallest per-sample speed (slow-down bound)
    #[arg(long)]
    max_slowdown: Option<f64>,

    /// Gaussian smoothing sigma, in samples
    #[arg(long)]
    smoothing: Option<f64>,
}

impl CalibrationArgs {
    /// Layer the overrides on top of `base` and validate the result.
    pub fn apply(&self, base: Calibration) -> anyhow::Result<Calibration> {
        let mut calibration = base;
        if let Some(v) = self.min_tempo {
            calibration.min_tempo_baseline = v;
        }
        if let Some(v) = self.reference_fps {
            calibration.reference_fps = v;
        }
        if let Some(v) = self.max_speedup {
            calibration.max_speedup = v;
        }
        if let Some(v) = self.max_slowdown {
            calibration.max_slowdown = v;
        }
        if let Some(v) = self.smoothing {
            calibration.smoothing_sigma = v;
        }
        calibration
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid calibration: {e}"))?;
        Ok(calibration)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    tempo_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Normalize {
            videos,
            output,
            comparison,
            no_report,
            jobs,
            calibration,
        } => {
            let calibration = calibration.apply(config.calibration)?;
            let options = commands::normalize::NormalizeArgs {
                output_dir: output.unwrap_or_else(|| config.output_dir.clone()),
                comparison,
                report: !no_report,
                jobs,
            };
            commands::normalize::run(videos, options, calibration, config.media).await
        }
        Commands::Analyze {
            videos,
            calibration,
        } => {
            let calibration = calibration.apply(config.calibration)?;
            commands::analyze::run(videos, calibration, &config.media)
        }
        Commands::Check => commands::check::run(&config.media),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_normalize_flags_parse() {
        let cli = Cli::try_parse_from([
            "tempo",
            "normalize",
            "a.mp4",
            "b.mp4",
            "-c",
            "--jobs",
            "2",
            "--max-speedup",
            "3.0",
        ])
        .unwrap();
        match cli.command {
            Commands::Normalize {
                videos,
                comparison,
                jobs,
                calibration,
                ..
            } => {
                assert_eq!(videos.len(), 2);
                assert!(comparison);
                assert_eq!(jobs, 2);
                let cal = calibration.apply(Calibration::default()).unwrap();
                assert_eq!(cal.max_speedup, 3.0);
                assert_eq!(cal.max_slowdown, 0.6);
            }
            _ => panic!("expected normalize"),
        }
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = CalibrationArgs {
            max_slowdown: Some(2.0),
            ..Default::default()
        };
        assert!(args.apply(Calibration::default()).is_err());
    }

    #[test]
    fn test_normalize_requires_videos() {
        assert!(Cli::try_parse_from(["tempo", "normalize"]).is_err());
    }
}
