//! Tempo Common Utilities
//!
//! Shared infrastructure for all tempo crates:
//! - Error types and result aliases
//! - Calibration constants and application configuration
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
