//! Tempo classification and the plan the speed curve is built from.

use serde::{Deserialize, Serialize};

/// How a clip's opening motion compares to the calibrated floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoZone {
    /// Opening raw motion at or above the minimum acceptable tempo.
    /// Only internal smoothing, no intended global retiming.
    Fast,
    /// Slightly below the floor. Gentle nudge, stronger if noise is
    /// suspected of masking the real motion.
    Borderline,
    /// Real slow motion. Aggressive global speed-up.
    Slow,
}

impl TempoZone {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Borderline => "borderline",
            Self::Slow => "slow",
        }
    }
}

impl std::fmt::Display for TempoZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zone decision and retiming target for one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoPlan {
    pub zone: TempoZone,
    /// Target px/frame each sample's speed is adjusted toward.
    pub reference_tempo: f64,
    /// How far each sample moves toward its exact needed speed, in `[0, 1]`.
    pub correction_strength: f64,
    /// Mean smoothed raw motion over the reference window.
    pub beginning_raw: f64,
    /// Mean smoothed subject motion over the reference window.
    pub beginning_subject: f64,
    /// Tempo floor at the clip's frame rate.
    pub min_acceptable: f64,
    /// Lower edge of the Borderline zone.
    pub borderline_threshold: f64,
    /// Number of samples averaged for the beginning tempos.
    pub reference_window: usize,
}

/// Direction of the subject tempo from the start of a clip to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoTrend {
    Steady,
    SpeedsUp,
    SlowsDown,
}

/// Reporting classification shown per clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "trend", rename_all = "snake_case")]
pub enum TempoStatus {
    /// Full speed-up.
    Slow,
    /// Gentle nudge.
    Borderline,
    /// Tempo is fine; the curve only evens out internal variation.
    Good(TempoTrend),
}

impl std::fmt::Display for TempoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slow => f.write_str("SLOW - full speedup"),
            Self::Borderline => f.write_str("BORDERLINE - gentle nudge"),
            Self::Good(TempoTrend::Steady) => f.write_str("GOOD tempo - minimal adjustment"),
            Self::Good(TempoTrend::SpeedsUp) => {
                f.write_str("GOOD tempo, but speeds up internally - smoothing")
            }
            Self::Good(TempoTrend::SlowsDown) => {
                f.write_str("GOOD tempo, but slows down internally - smoothing")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_serializes_snake_case() {
        let json = serde_json::to_string(&TempoZone::Borderline).unwrap();
        assert_eq!(json, "\"borderline\"");
    }

    #[test]
    fn test_status_serialization_carries_trend() {
        let json = serde_json::to_string(&TempoStatus::Good(TempoTrend::SlowsDown)).unwrap();
        assert_eq!(json, r#"{"status":"good","trend":"slows_down"}"#);
        let json = serde_json::to_string(&TempoStatus::Slow).unwrap();
        assert_eq!(json, r#"{"status":"slow"}"#);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TempoStatus::Slow.to_string(), "SLOW - full speedup");
        assert_eq!(
            TempoStatus::Good(TempoTrend::Steady).to_string(),
            "GOOD tempo - minimal adjustment"
        );
    }
}
