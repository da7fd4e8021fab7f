//! Error types shared across tempo crates.

use std::path::PathBuf;

/// Top-level error type for tempo operations.
#[derive(Debug, thiserror::Error)]
pub enum TempoError {
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Non-fatal: the caller substitutes the reference fps and continues.
    #[error("Invalid frame rate {fps}; substituting reference fps")]
    InvalidFps { fps: f64 },

    /// Non-fatal: the planner falls back to an identity speed curve.
    #[error("Reference tempo {reference_tempo:.6} px/frame is too small to retime against")]
    DegenerateTempo { reference_tempo: f64 },

    /// Non-fatal: the planner falls back to an identity speed curve.
    #[error("Only {count} motion samples; at least {required} are needed to classify tempo")]
    InsufficientSamples { count: usize, required: usize },

    #[error("Report error: {message}")]
    Report { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TempoError.
pub type TempoResult<T> = Result<T, TempoError>;

impl TempoError {
    pub fn decode(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn encode(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Encode {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the engine recovers from this error with an identity curve
    /// or a substituted value instead of skipping the file.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidFps { .. } | Self::DegenerateTempo { .. } | Self::InsufficientSamples { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(TempoError::InvalidFps { fps: 0.0 }.is_recoverable());
        assert!(TempoError::DegenerateTempo {
            reference_tempo: 0.0
        }
        .is_recoverable());
        assert!(TempoError::InsufficientSamples {
            count: 3,
            required: 10
        }
        .is_recoverable());
        assert!(!TempoError::decode("a.mp4", "corrupt").is_recoverable());
    }

    #[test]
    fn test_decode_message_names_path() {
        let err = TempoError::decode("clip.mp4", "moov atom not found");
        assert_eq!(
            err.to_string(),
            "Decode error for clip.mp4: moov atom not found"
        );
    }
}
