//! Tempo Processing Core — the retiming engine
//!
//! Measures how fast a clip *looks* and retimes it toward a calibrated pace:
//! - **Flow:** Dense per-pixel motion between consecutive frames
//! - **Motion Analysis:** Raw and camera-compensated motion series plus a
//!   noise-robustness factor
//! - **Tempo Planning:** Zone classification and a smoothed, ramped speed curve
//! - **Resampling:** Nearest-preceding frame selection along the retimed axis
//!
//! This crate is pure computation: no I/O and no process spawning.
//! All inputs are data; all outputs are data.

pub mod diagnostics;
pub mod flow;
pub mod gaussian;
pub mod motion;
pub mod pipeline;
pub mod planner;
pub mod resample;
pub mod status;

pub use motion::{MotionAnalysis, MotionAnalyzer};
pub use pipeline::{Normalization, NormalizeOptions, Normalizer};
pub use planner::{SpeedPlan, TempoPlanner};
pub use resample::FrameResampler;
