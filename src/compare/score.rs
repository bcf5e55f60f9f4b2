use serde::{Deserialize, Serialize};

use crate::error::{Result, TonicaError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    /// `precision = 1 - |Δ| / tolerance`, clamped to `[0, 1]`.
    #[default]
    Continuous,
    /// Flat / in tune / sharp around the tolerance band.
    TriState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tuning {
    Flat,
    InTune,
    Sharp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scoring {
    pub mode: ScoringMode,
    pub tolerance_hz: f64,
}

impl Scoring {
    pub fn continuous(tolerance_hz: f64) -> Self {
        Self {
            mode: ScoringMode::Continuous,
            tolerance_hz,
        }
    }

    pub fn tri_state(tolerance_hz: f64) -> Self {
        Self {
            mode: ScoringMode::TriState,
            tolerance_hz,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_hz.is_finite() || self.tolerance_hz <= 0.0 {
            return Err(TonicaError::invalid(format!(
                "tolerance must be positive, got {}",
                self.tolerance_hz
            )));
        }
        Ok(())
    }

    pub fn score(&self, live_hz: Option<f64>, expected_hz: Option<f64>) -> ComparisonResult {
        let (Some(live), Some(expected)) = (live_hz, expected_hz) else {
            return ComparisonResult {
                live_hz,
                expected_hz,
                ..ComparisonResult::default()
            };
        };

        let delta = (live - expected).abs();
        let precision = (1.0 - delta / self.tolerance_hz).clamp(0.0, 1.0);
        let tuning = match self.mode {
            ScoringMode::Continuous => None,
            ScoringMode::TriState => Some(tuning(live - expected, self.tolerance_hz)),
        };

        ComparisonResult {
            live_hz,
            expected_hz,
            delta_hz: Some(delta),
            precision: Some(precision),
            tuning,
        }
    }
}

impl Default for Scoring {
    fn default() -> Self {
        Self::continuous(50.0)
    }
}

fn tuning(diff: f64, tolerance: f64) -> Tuning {
    if diff > tolerance {
        Tuning::Sharp
    } else if diff < -tolerance {
        Tuning::Flat
    } else {
        Tuning::InTune
    }
}

/// Live-versus-expected deviation for one display tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub live_hz: Option<f64>,
    pub expected_hz: Option<f64>,
    pub delta_hz: Option<f64>,
    pub precision: Option<f64>,
    /// Only filled in tri-state mode.
    pub tuning: Option<Tuning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_precision() {
        let r = Scoring::continuous(50.0).score(Some(440.0), Some(445.0));
        assert_eq!(r.delta_hz, Some(5.0));
        assert!((r.precision.unwrap() - 0.9).abs() < 1e-12);
        assert_eq!(r.tuning, None);
    }

    #[test]
    fn precision_is_clamped() {
        let r = Scoring::continuous(50.0).score(Some(200.0), Some(400.0));
        assert_eq!(r.precision, Some(0.0));
        let r = Scoring::continuous(50.0).score(Some(400.0), Some(400.0));
        assert_eq!(r.precision, Some(1.0));
    }

    #[test]
    fn missing_side_has_no_score() {
        let r = Scoring::default().score(None, Some(300.0));
        assert_eq!(r.expected_hz, Some(300.0));
        assert_eq!(r.delta_hz, None);
        assert_eq!(r.precision, None);

        let r = Scoring::default().score(Some(300.0), None);
        assert_eq!(r.live_hz, Some(300.0));
        assert_eq!(r.precision, None);
    }

    #[test]
    fn tri_state_buckets() {
        let s = Scoring::tri_state(15.0);
        assert_eq!(s.score(Some(420.0), Some(400.0)).tuning, Some(Tuning::Sharp));
        assert_eq!(s.score(Some(380.0), Some(400.0)).tuning, Some(Tuning::Flat));
        assert_eq!(s.score(Some(410.0), Some(400.0)).tuning, Some(Tuning::InTune));
        assert_eq!(s.score(Some(415.0), Some(400.0)).tuning, Some(Tuning::InTune));
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        assert!(Scoring::continuous(0.0).validate().is_err());
        assert!(Scoring::continuous(f64::NAN).validate().is_err());
        assert!(Scoring::tri_state(15.0).validate().is_ok());
    }
}
