//! Application configuration and tempo calibration.
//!
//! Every threshold the engine uses is an empirically calibrated constant
//! tuned against reference footage. They live here as named defaults and
//! travel with each call through [`Calibration`], so two invocations with
//! different calibration never interfere.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{TempoError, TempoResult};

/// Minimum acceptable tempo at the reference frame rate (px/frame).
pub const MIN_TEMPO_BASELINE: f64 = 1.5;

/// Frame rate at which [`MIN_TEMPO_BASELINE`] was measured.
pub const REFERENCE_FPS: f64 = 24.0;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where normalized clips and reports are written.
    pub output_dir: PathBuf,

    /// Engine calibration.
    pub calibration: Calibration,

    /// Decode/encode settings.
    pub media: MediaDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Calibration constants for motion analysis, tempo planning and status
/// reporting.
///
/// Defaults reproduce the reference calibration exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Tempo floor at `reference_fps` (px/frame).
    pub min_tempo_baseline: f64,
    /// Frame rate the floor was measured at.
    pub reference_fps: f64,
    /// Frame rates above this are treated as invalid probe results.
    pub max_valid_fps: f64,

    /// Upper bound for a per-sample speed multiplier.
    pub max_speedup: f64,
    /// Lower bound for a per-sample speed multiplier.
    pub max_slowdown: f64,
    /// Gaussian sigma (samples) used for both series and the curve.
    pub smoothing_sigma: f64,

    /// Weight of the compensated subject energy in the subject magnitude;
    /// the camera magnitude gets the remainder.
    pub camera_blend: f64,

    /// Noise profile mapping.
    pub noise: NoiseCalibration,

    /// Zone thresholds and per-zone correction.
    pub zones: ZoneCalibration,

    /// Below this many motion samples the planner returns an identity curve.
    pub min_samples: usize,
    /// Reference tempos below this are degenerate.
    pub min_reference_tempo: f64,
    /// Added to the denominator of the needed-speed ratio.
    pub ratio_epsilon: f64,

    /// Reporting-only status thresholds.
    pub status: StatusCalibration,
}

/// Mapping from the mean/median flow ratio to a noise discount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseCalibration {
    /// Ratio at or above which footage is considered clean (factor 1.0).
    pub clean_ratio: f64,
    /// Ratio at or below which the maximum discount applies.
    pub noisy_ratio: f64,
    /// Largest fractional discount, applied at `noisy_ratio` and below.
    pub max_discount: f64,
    /// Ratio assumed when medians are near zero.
    pub fallback_ratio: f64,
    /// Mean of medians at or below which `fallback_ratio` is used.
    pub min_median: f64,
}

/// Zone boundaries and the correction each zone applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneCalibration {
    /// Borderline floor as a fraction of the minimum acceptable tempo.
    pub borderline_ratio: f64,
    /// Correction strength in the Fast zone.
    pub fast_correction: f64,
    /// Noise factors below this mark a borderline clip as noise-masked.
    pub noise_suspect_factor: f64,
    /// Boost and correction slope per unit shortfall below the minimum.
    pub borderline_boost_slope: f64,
    /// Cap on the noise-masked borderline boost.
    pub borderline_max_boost: f64,
    /// Base correction strength for borderline clips.
    pub borderline_correction: f64,
    /// Cap on the noise-masked borderline correction strength.
    pub borderline_max_correction: f64,
    /// Boost applied to clean borderline clips.
    pub borderline_gentle_boost: f64,
    /// Slow-zone reference as a multiple of the beginning subject tempo.
    pub slow_subject_multiplier: f64,
    /// Slow-zone reference as a multiple of the minimum acceptable tempo.
    pub slow_floor_multiplier: f64,
    /// Correction strength in the Slow zone.
    pub slow_correction: f64,
}

/// Thresholds for the status line printed per clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCalibration {
    /// Slow status below this fraction of the minimum acceptable tempo.
    pub slow_ratio: f64,
    /// Ending/beginning subject ratio above which a clip "speeds up".
    pub rising_ratio: f64,
    /// Ending/beginning subject ratio below which a clip "slows down".
    pub falling_ratio: f64,
}

/// Default decode/encode parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaDefaults {
    /// ffmpeg binary name or path.
    pub ffmpeg: String,

    /// ffprobe binary name or path.
    pub ffprobe: String,

    /// Output video codec.
    pub video_codec: String,

    /// Constant rate factor for the output codec.
    pub crf: u32,

    /// Output pixel format.
    pub pixel_format: String,

    /// TrueType font for comparison labels. When unset, common system
    /// locations are searched.
    pub label_font: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tempo=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("normalized"),
            calibration: Calibration::default(),
            media: MediaDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_tempo_baseline: MIN_TEMPO_BASELINE,
            reference_fps: REFERENCE_FPS,
            max_valid_fps: 120.0,
            max_speedup: 2.0,
            max_slowdown: 0.6,
            smoothing_sigma: 10.0,
            camera_blend: 0.5,
            noise: NoiseCalibration::default(),
            zones: ZoneCalibration::default(),
            min_samples: 10,
            min_reference_tempo: 0.001,
            ratio_epsilon: 0.001,
            status: StatusCalibration::default(),
        }
    }
}

impl Default for NoiseCalibration {
    fn default() -> Self {
        Self {
            clean_ratio: 3.0,
            noisy_ratio: 1.5,
            max_discount: 0.22,
            fallback_ratio: 5.0,
            min_median: 0.01,
        }
    }
}

impl Default for ZoneCalibration {
    fn default() -> Self {
        Self {
            borderline_ratio: 0.85,
            fast_correction: 0.5,
            noise_suspect_factor: 0.95,
            borderline_boost_slope: 0.4 / 0.15,
            borderline_max_boost: 1.4,
            borderline_correction: 0.3,
            borderline_max_correction: 0.7,
            borderline_gentle_boost: 1.05,
            slow_subject_multiplier: 2.2,
            slow_floor_multiplier: 1.2,
            slow_correction: 0.95,
        }
    }
}

impl Default for StatusCalibration {
    fn default() -> Self {
        Self {
            slow_ratio: 0.8,
            rising_ratio: 1.2,
            falling_ratio: 0.8,
        }
    }
}

impl Default for MediaDefaults {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            crf: 18,
            pixel_format: "yuv420p".to_string(),
            label_font: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl NoiseCalibration {
    /// Noise factor at the noisy end of the mapping (0.78 by default).
    pub fn min_factor(&self) -> f64 {
        1.0 - self.max_discount
    }
}

impl Calibration {
    /// Minimum acceptable tempo (px/frame) at `fps`.
    ///
    /// A constant real-world speed covers fewer pixels per frame at higher
    /// frame rates, so the floor scales with `reference_fps / fps`.
    pub fn min_acceptable(&self, fps: f64) -> f64 {
        self.min_tempo_baseline * (self.reference_fps / fps)
    }

    /// Lower edge of the Borderline zone at `fps`.
    pub fn borderline_threshold(&self, fps: f64) -> f64 {
        self.min_acceptable(fps) * self.zones.borderline_ratio
    }

    /// Whether a probed frame rate can be trusted.
    pub fn is_valid_fps(&self, fps: f64) -> bool {
        fps.is_finite() && fps > 0.0 && fps <= self.max_valid_fps
    }

    /// Reject calibrations the planner cannot work with.
    pub fn validate(&self) -> TempoResult<()> {
        if !(self.reference_fps > 0.0) {
            return Err(TempoError::config("reference_fps must be positive"));
        }
        if !(self.min_tempo_baseline > 0.0) {
            return Err(TempoError::config("min_tempo_baseline must be positive"));
        }
        if self.min_samples == 0 {
            return Err(TempoError::config("min_samples must be at least 1"));
        }
        if !(self.smoothing_sigma > 0.0) {
            return Err(TempoError::config("smoothing_sigma must be positive"));
        }
        if !(self.max_slowdown > 0.0 && self.max_slowdown <= 1.0) {
            return Err(TempoError::config(format!(
                "max_slowdown must be in (0, 1], got {}",
                self.max_slowdown
            )));
        }
        if !(self.max_speedup >= 1.0) {
            return Err(TempoError::config(format!(
                "max_speedup must be at least 1.0, got {}",
                self.max_speedup
            )));
        }
        if !(0.0..=1.0).contains(&self.camera_blend) {
            return Err(TempoError::config("camera_blend must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&self.noise.max_discount) {
            return Err(TempoError::config("noise.max_discount must be in [0, 1)"));
        }
        if self.noise.noisy_ratio >= self.noise.clean_ratio {
            return Err(TempoError::config(
                "noise.noisy_ratio must be below noise.clean_ratio",
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("tempo").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_acceptable_scales_inversely_with_fps() {
        let cal = Calibration::default();
        assert_eq!(cal.min_acceptable(24.0), 1.5);
        assert_eq!(cal.min_acceptable(48.0), cal.min_acceptable(24.0) / 2.0);
        assert_eq!(cal.min_acceptable(60.0), cal.min_acceptable(30.0) / 2.0);
        assert!((cal.borderline_threshold(24.0) - 1.275).abs() < 1e-12);
    }

    #[test]
    fn test_default_calibration_is_valid() {
        assert!(Calibration::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let cal = Calibration {
            max_slowdown: 1.5,
            ..Calibration::default()
        };
        assert!(matches!(cal.validate(), Err(TempoError::Config { .. })));

        let cal = Calibration {
            max_speedup: 0.5,
            ..Calibration::default()
        };
        assert!(cal.validate().is_err());

        let cal = Calibration {
            reference_fps: 0.0,
            ..Calibration::default()
        };
        assert!(cal.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_min_samples() {
        let cal = Calibration {
            min_samples: 0,
            ..Calibration::default()
        };
        assert!(matches!(cal.validate(), Err(TempoError::Config { .. })));
    }

    #[test]
    fn test_fps_validity() {
        let cal = Calibration::default();
        assert!(cal.is_valid_fps(24.0));
        assert!(cal.is_valid_fps(120.0));
        assert!(!cal.is_valid_fps(0.0));
        assert!(!cal.is_valid_fps(-30.0));
        assert!(!cal.is_valid_fps(240.0));
        assert!(!cal.is_valid_fps(f64::NAN));
    }

    #[test]
    fn test_config_json_roundtrip_and_partial_files() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.calibration, config.calibration);

        let partial: AppConfig =
            serde_json::from_str(r#"{"calibration": {"max_speedup": 3.0}}"#).unwrap();
        assert_eq!(partial.calibration.max_speedup, 3.0);
        assert_eq!(partial.calibration.min_tempo_baseline, MIN_TEMPO_BASELINE);
        assert_eq!(partial.calibration.zones.borderline_ratio, 0.85);
        assert_eq!(partial.media.video_codec, "libx264");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = AppConfig::load_from(std::path::Path::new("/nonexistent/tempo.json"));
        assert_eq!(config.calibration, Calibration::default());
    }
}
