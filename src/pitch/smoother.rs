use serde::Deserialize;

use crate::error::{Result, TonicaError};

/// What happens to the held value when a frame carries no pitch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// Multiply by `decay` each unvoiced frame; drop once below `min_hz`.
    #[default]
    Decay,
    /// Forget the held value on the first unvoiced frame.
    Hard,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SmootherConfig {
    /// Weight of the previous value when blending, in `[0, 1]`.
    pub alpha: f64,
    /// Per-frame multiplier applied while unvoiced, in `[0, 1]`.
    pub decay: f64,
    /// Below this the decayed value is reported as no pitch.
    pub min_hz: f64,
    pub reset: ResetPolicy,
}

impl SmootherConfig {
    pub fn live() -> Self {
        Self {
            alpha: 0.8,
            decay: 0.9,
            min_hz: 50.0,
            reset: ResetPolicy::Decay,
        }
    }

    /// Batch analysis holds the last voiced value through gaps.
    pub fn reference() -> Self {
        Self {
            alpha: 0.7,
            decay: 1.0,
            min_hz: 50.0,
            reset: ResetPolicy::Decay,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(TonicaError::invalid(format!(
                "smoothing factor must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.decay) {
            return Err(TonicaError::invalid(format!(
                "decay must be within [0, 1], got {}",
                self.decay
            )));
        }
        if !self.min_hz.is_finite() || self.min_hz < 0.0 {
            return Err(TonicaError::invalid(format!(
                "smoother min_hz must be non-negative, got {}",
                self.min_hz
            )));
        }
        Ok(())
    }
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self::live()
    }
}

/// Exponential smoother with dropout bridging. One instance per source.
#[derive(Clone, Debug)]
pub struct PitchSmoother {
    config: SmootherConfig,
    last_hz: Option<f64>,
}

impl PitchSmoother {
    pub fn new(config: SmootherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            last_hz: None,
        })
    }

    pub fn update(&mut self, hz: Option<f64>) -> Option<f64> {
        match hz.filter(|f| f.is_finite() && *f > 0.0) {
            Some(hz) => {
                let next = match self.last_hz {
                    Some(last) => last * self.config.alpha + hz * (1.0 - self.config.alpha),
                    None => hz,
                };
                self.last_hz = Some(next);
            }
            None => match self.config.reset {
                ResetPolicy::Hard => self.last_hz = None,
                ResetPolicy::Decay => {
                    self.last_hz = self
                        .last_hz
                        .map(|last| last * self.config.decay)
                        .filter(|&last| last >= self.config.min_hz);
                }
            },
        }
        self.last_hz
    }

    pub fn last_hz(&self) -> Option<f64> {
        self.last_hz
    }

    pub fn reset(&mut self) {
        self.last_hz = None;
    }
}
