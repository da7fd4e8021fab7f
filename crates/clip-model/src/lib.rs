//! Tempo Clip Model
//!
//! Defines the data contracts that flow between the engine stages:
//! - **Frames:** Immutable, cheaply shared pixel buffers and decoded clips
//! - **Motion:** Per-pair motion samples and the clip-wide noise profile
//! - **Plan:** Tempo zone, reference tempo, and reporting status
//! - **Timeline:** Speed curves and the resampled input-time axis
//!
//! Motion magnitudes are in px/frame at the clip's native resolution.

pub mod frame;
pub mod motion;
pub mod plan;
pub mod timeline;

pub use frame::*;
pub use motion::*;
pub use plan::*;
pub use timeline::*;
