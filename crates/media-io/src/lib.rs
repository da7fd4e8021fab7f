//! Tempo Media I/O
//!
//! Everything that touches files: decoding clips into frames, encoding
//! retimed frames, side-by-side comparison videos and JSON analysis
//! reports.
//!
//! ```text
//! input.mp4 ── ffprobe ──┐
//!                        ├── FfmpegSource ── Clip ── Normalizer
//!          ── ffmpeg ────┘                              │
//!                                  ┌────────────────────┤
//!                                  ▼                    ▼
//!                         FfmpegSink (H.264)      JsonReporter
//!                                  │                    │
//!                                  ▼                    ▼
//!                      <stem>_normalized.mp4   <stem>_analysis.json
//! ```

pub mod comparison;
pub mod ffmpeg;
pub mod report;

pub use comparison::{side_by_side, write_comparison, ComparisonLabels};
pub use ffmpeg::{FfmpegSink, FfmpegSource, FrameSource, VideoInfo, VideoSink};
pub use report::{AnalysisReport, DiagnosticReporter, JsonReporter};
