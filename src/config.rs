use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compare::{Interpolation, Scoring, ScoringMode};
use crate::error::{Result, TonicaError};
use crate::pitch::{AcfStrategy, DetectorConfig, ResetPolicy, SmootherConfig};
use crate::reference::{song_base_name, BuilderConfig};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub comparator: ComparatorConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub delays: SongDelays,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_songs_dir")]
    pub songs_dir: PathBuf,
    #[serde(default = "default_references_dir")]
    pub references_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_live_threshold")]
    pub silence_threshold: f64,
    #[serde(default = "default_min_hz")]
    pub min_hz: f64,
    #[serde(default = "default_live_max_hz")]
    pub max_hz: f64,
    #[serde(default)]
    pub strategy: AcfStrategy,
    #[serde(default = "default_live_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_live_decay")]
    pub decay: f64,
    #[serde(default)]
    pub reset: ResetPolicy,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_frame_size")]
    pub hop_size: usize,
    #[serde(default = "default_reference_threshold")]
    pub silence_threshold: f64,
    #[serde(default = "default_min_hz")]
    pub min_hz: f64,
    #[serde(default = "default_reference_max_hz")]
    pub max_hz: f64,
    #[serde(default)]
    pub strategy: AcfStrategy,
    #[serde(default = "default_reference_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_reference_decay")]
    pub decay: f64,
    #[serde(default)]
    pub reset: ResetPolicy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    #[default]
    Step,
    Linear,
}

#[derive(Debug, Deserialize)]
pub struct ComparatorConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance_hz: f64,
    #[serde(default)]
    pub scoring: ScoringMode,
    #[serde(default)]
    pub interpolation: InterpolationMode,
    #[serde(default = "default_linear_smoothing")]
    pub linear_smoothing: f64,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_leader_delay")]
    pub leader_start_delay_ms: u64,
    #[serde(default = "default_display_rate")]
    pub display_rate_hz: f64,
}

/// Manual per-song lead-in, keyed by song base name. Unknown songs get 0.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct SongDelays(HashMap<String, f64>);

impl SongDelays {
    pub fn new(delays: HashMap<String, f64>) -> Self {
        Self(delays)
    }

    pub fn offset_for(&self, song: &str) -> f64 {
        let base = song_base_name(song);
        self.0
            .get(base)
            .or_else(|| self.0.get(song))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            songs_dir: default_songs_dir(),
            references_dir: default_references_dir(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            silence_threshold: default_live_threshold(),
            min_hz: default_min_hz(),
            max_hz: default_live_max_hz(),
            strategy: AcfStrategy::default(),
            smoothing: default_live_smoothing(),
            decay: default_live_decay(),
            reset: ResetPolicy::default(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            hop_size: default_frame_size(),
            silence_threshold: default_reference_threshold(),
            min_hz: default_min_hz(),
            max_hz: default_reference_max_hz(),
            strategy: AcfStrategy::default(),
            smoothing: default_reference_smoothing(),
            decay: default_reference_decay(),
            reset: ResetPolicy::default(),
        }
    }
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            tolerance_hz: default_tolerance(),
            scoring: ScoringMode::default(),
            interpolation: InterpolationMode::default(),
            linear_smoothing: default_linear_smoothing(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            leader_start_delay_ms: default_leader_delay(),
            display_rate_hz: default_display_rate(),
        }
    }
}

fn default_songs_dir() -> PathBuf { "uploads".into() }
fn default_references_dir() -> PathBuf { "references".into() }
fn default_frame_size() -> usize { 2048 }
fn default_live_threshold() -> f64 { 0.008 }
fn default_reference_threshold() -> f64 { 0.01 }
fn default_min_hz() -> f64 { 50.0 }
fn default_live_max_hz() -> f64 { 1000.0 }
fn default_reference_max_hz() -> f64 { 2000.0 }
fn default_live_smoothing() -> f64 { 0.8 }
fn default_live_decay() -> f64 { 0.9 }
fn default_reference_smoothing() -> f64 { 0.7 }
fn default_reference_decay() -> f64 { 1.0 }
fn default_tolerance() -> f64 { 50.0 }
fn default_linear_smoothing() -> f64 { 0.2 }
fn default_leader_delay() -> u64 { 1000 }
fn default_display_rate() -> f64 { 60.0 }

impl LiveConfig {
    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            silence_threshold: self.silence_threshold,
            min_hz: self.min_hz,
            max_hz: self.max_hz,
            strategy: self.strategy,
        }
    }

    pub fn smoother(&self) -> SmootherConfig {
        SmootherConfig {
            alpha: self.smoothing,
            decay: self.decay,
            min_hz: self.min_hz,
            reset: self.reset,
        }
    }
}

impl ReferenceConfig {
    pub fn builder(&self) -> BuilderConfig {
        BuilderConfig {
            hop_size: self.hop_size,
            detector: DetectorConfig {
                silence_threshold: self.silence_threshold,
                min_hz: self.min_hz,
                max_hz: self.max_hz,
                strategy: self.strategy,
            },
            smoother: SmootherConfig {
                alpha: self.smoothing,
                decay: self.decay,
                min_hz: self.min_hz,
                reset: self.reset,
            },
        }
    }
}

impl ComparatorConfig {
    pub fn interpolation(&self) -> Interpolation {
        match self.interpolation {
            InterpolationMode::Step => Interpolation::Step,
            InterpolationMode::Linear => Interpolation::Linear {
                smoothing: self.linear_smoothing,
            },
        }
    }

    pub fn scoring(&self) -> Scoring {
        Scoring {
            mode: self.scoring,
            tolerance_hz: self.tolerance_hz,
        }
    }
}

impl SessionConfig {
    pub fn leader_start_delay(&self) -> Duration {
        Duration::from_millis(self.leader_start_delay_ms)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.live.frame_size == 0 {
            return Err(TonicaError::invalid("live.frame_size must be positive"));
        }
        self.live.detector().validate()?;
        self.live.smoother().validate()?;

        let builder = self.reference.builder();
        if builder.hop_size == 0 {
            return Err(TonicaError::invalid("reference.hop_size must be positive"));
        }
        builder.detector.validate()?;
        builder.smoother.validate()?;

        self.comparator.scoring().validate()?;
        let s = self.comparator.linear_smoothing;
        if !(s > 0.0 && s <= 1.0) {
            return Err(TonicaError::invalid(format!(
                "comparator.linear_smoothing must be within (0, 1], got {}",
                s
            )));
        }

        let rate = self.session.display_rate_hz;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(TonicaError::invalid(format!(
                "session.display_rate_hz must be positive, got {}",
                rate
            )));
        }

        if let Some((song, offset)) = self.delays.0.iter().find(|(_, v)| !v.is_finite()) {
            return Err(TonicaError::invalid(format!(
                "delay for '{}' is not a number: {}",
                song, offset
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}
