use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;

use crate::error::{Result, TonicaError};

use super::frame::AudioFrame;

/// How the autocorrelation is computed. Both produce the same biased ACF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcfStrategy {
    /// Direct O(N²) lag sum.
    #[default]
    Direct,
    /// Zero-padded FFT, |X|², inverse FFT.
    Fft,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Frames whose RMS falls below this are treated as silence.
    pub silence_threshold: f64,
    pub min_hz: f64,
    pub max_hz: f64,
    pub strategy: AcfStrategy,
}

impl DetectorConfig {
    /// Microphone input: voice range only.
    pub fn live() -> Self {
        Self {
            silence_threshold: 0.008,
            min_hz: 50.0,
            max_hz: 1000.0,
            strategy: AcfStrategy::Direct,
        }
    }

    /// Whole-song analysis: wider range to tolerate instrumental lines.
    pub fn reference() -> Self {
        Self {
            silence_threshold: 0.01,
            min_hz: 50.0,
            max_hz: 2000.0,
            strategy: AcfStrategy::Direct,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(TonicaError::invalid(format!(
                "silence threshold must be a non-negative number, got {}",
                self.silence_threshold
            )));
        }
        if !(self.min_hz.is_finite() && self.max_hz.is_finite()) || self.min_hz <= 0.0 {
            return Err(TonicaError::invalid(format!(
                "frequency range must be positive and finite, got {}..{}",
                self.min_hz, self.max_hz
            )));
        }
        if self.min_hz >= self.max_hz {
            return Err(TonicaError::invalid(format!(
                "min_hz ({}) must be below max_hz ({})",
                self.min_hz, self.max_hz
            )));
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::live()
    }
}

/// Per-frame outcome. `hz` is `None` for silence or an unreliable estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchEstimate {
    pub hz: Option<f64>,
    pub rms: f64,
}

impl PitchEstimate {
    pub fn silent(rms: f64) -> Self {
        Self { hz: None, rms }
    }
}

#[derive(Clone)]
struct FftPlan {
    frame_len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl FftPlan {
    fn new(frame_len: usize) -> Self {
        let len = (2 * frame_len).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        Self {
            frame_len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            buffer: vec![Complex::new(0.0, 0.0); len],
        }
    }
}

/// Autocorrelation pitch detector with a silence gate and parabolic peak
/// refinement. Holds its scratch buffers so repeated calls do not allocate.
#[derive(Clone)]
pub struct PitchDetector {
    config: DetectorConfig,
    acf: Vec<f64>,
    fft: Option<FftPlan>,
}

impl PitchDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            acf: Vec::new(),
            fft: None,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn detect_frame(&mut self, frame: &AudioFrame) -> PitchEstimate {
        self.detect(frame.samples(), frame.sample_rate())
    }

    pub fn detect(&mut self, samples: &[f32], sample_rate: u32) -> PitchEstimate {
        let rms = rms(samples);
        if !rms.is_finite() {
            return PitchEstimate::silent(0.0);
        }
        if sample_rate == 0 || rms < self.config.silence_threshold {
            return PitchEstimate::silent(rms);
        }

        self.autocorrelate(samples);

        let hz = refined_period(&self.acf)
            .map(|period| sample_rate as f64 / period)
            .filter(|&f| f.is_finite() && f >= self.config.min_hz && f <= self.config.max_hz);

        PitchEstimate { hz, rms }
    }

    /// The most recent autocorrelation, `c[0]` being the frame energy.
    pub fn acf(&self) -> &[f64] {
        &self.acf
    }

    fn autocorrelate(&mut self, samples: &[f32]) {
        let n = samples.len();
        self.acf.clear();
        self.acf.resize(n, 0.0);

        match self.config.strategy {
            AcfStrategy::Direct => {
                for (lag, out) in self.acf.iter_mut().enumerate() {
                    *out = samples[..n - lag]
                        .iter()
                        .zip(&samples[lag..])
                        .map(|(&a, &b)| a as f64 * b as f64)
                        .sum();
                }
            }
            AcfStrategy::Fft => {
                if self.fft.as_ref().map_or(true, |p| p.frame_len != n) {
                    self.fft = Some(FftPlan::new(n));
                }
                let Some(plan) = self.fft.as_mut() else {
                    return;
                };

                for (i, slot) in plan.buffer.iter_mut().enumerate() {
                    let s = samples.get(i).copied().unwrap_or(0.0) as f64;
                    *slot = Complex::new(s, 0.0);
                }
                plan.forward.process(&mut plan.buffer);
                for c in plan.buffer.iter_mut() {
                    *c = Complex::new(c.norm_sqr(), 0.0);
                }
                plan.inverse.process(&mut plan.buffer);

                let scale = plan.buffer.len() as f64;
                for (out, c) in self.acf.iter_mut().zip(&plan.buffer) {
                    *out = c.re / scale;
                }
            }
        }
    }
}

pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Period in (fractional) samples of the first autocorrelation peak past the
/// zero-lag lobe, or `None` when there is no such peak.
fn refined_period(c: &[f64]) -> Option<f64> {
    let n = c.len();
    if n < 2 {
        return None;
    }

    // Walk down the zero-lag lobe.
    let mut d = 0;
    while d + 1 < n && c[d] > c[d + 1] {
        d += 1;
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in c.iter().enumerate().skip(d) {
        if best.map_or(true, |(_, max)| v > max) {
            best = Some((i, v));
        }
    }
    let (maxi, _) = best?;
    if maxi == 0 {
        return None;
    }

    let x1 = c[maxi - 1];
    let x2 = c[maxi];
    let x3 = c.get(maxi + 1).copied().unwrap_or(x2);
    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;
    let shift = if a == 0.0 { 0.0 } else { -b / (2.0 * a) };

    Some(maxi as f64 + shift)
}
