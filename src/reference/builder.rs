use rayon::prelude::*;

use crate::audio::decode::AudioData;
use crate::error::{Result, TonicaError};
use crate::pitch::{DetectorConfig, PitchDetector, PitchEstimate, PitchSmoother, SmootherConfig};

use super::track::{round_to, ReferencePoint, ReferenceTrack};

#[derive(Clone, Debug, PartialEq)]
pub struct BuilderConfig {
    /// Samples per analysis frame; frames do not overlap.
    pub hop_size: usize,
    pub detector: DetectorConfig,
    pub smoother: SmootherConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            hop_size: 2048,
            detector: DetectorConfig::reference(),
            smoother: SmootherConfig::reference(),
        }
    }
}

/// Runs the detector over a whole decoded song.
///
/// Detection is parallel across frames; smoothing runs afterwards in frame
/// order, so identical input always yields an identical track.
pub struct ReferenceTrackBuilder {
    config: BuilderConfig,
    detector: PitchDetector,
}

impl ReferenceTrackBuilder {
    pub fn new(config: BuilderConfig) -> Result<Self> {
        if config.hop_size == 0 {
            return Err(TonicaError::invalid("hop size must be positive"));
        }
        config.smoother.validate()?;
        let detector = PitchDetector::new(config.detector.clone())?;
        Ok(Self { config, detector })
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn build_from_audio(&self, audio: &AudioData) -> Result<ReferenceTrack> {
        self.build(&audio.samples, audio.sample_rate)
    }

    pub fn build(&self, samples: &[f32], sample_rate: u32) -> Result<ReferenceTrack> {
        if sample_rate == 0 {
            return Err(TonicaError::invalid("sample rate must be positive"));
        }
        let hop = self.config.hop_size;

        // Trailing partial frame is dropped.
        let estimates: Vec<PitchEstimate> = samples
            .par_chunks_exact(hop)
            .map_init(
                || self.detector.clone(),
                |detector, frame| detector.detect(frame, sample_rate),
            )
            .collect();

        let mut smoother = PitchSmoother::new(self.config.smoother.clone())?;
        let sr = sample_rate as f64;
        let points: Vec<ReferencePoint> = estimates
            .iter()
            .enumerate()
            .map(|(i, estimate)| {
                let hz = smoother.update(estimate.hz).unwrap_or(0.0);
                ReferencePoint {
                    t: round_to((i * hop) as f64 / sr, 2),
                    hz: round_to(hz, 2),
                    rms: round_to(estimate.rms, 4),
                }
            })
            .collect();

        let voiced = estimates.iter().filter(|e| e.hz.is_some()).count();
        log::info!(
            "Reference: {} frames of {} samples, {} voiced, {:.1}s",
            points.len(),
            hop,
            voiced,
            (points.len() * hop) as f64 / sr
        );

        ReferenceTrack::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone_then_silence(freq: f32, sample_rate: u32, tone: usize, silence: usize) -> Vec<f32> {
        let mut samples: Vec<f32> = (0..tone)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        samples.extend(std::iter::repeat(0.0).take(silence));
        samples
    }

    #[test]
    fn one_point_per_whole_hop() {
        let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();
        let samples = vec![0.0; 2048 * 3 + 100];
        let track = builder.build(&samples, 44100).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track.points()[0].t, 0.0);
        assert_eq!(track.points()[1].t, 0.05);
        assert_eq!(track.points()[2].t, 0.09);
        assert!(track.points().iter().all(|p| p.hz == 0.0 && p.rms == 0.0));
    }

    #[test]
    fn short_input_yields_empty_track() {
        let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();
        let track = builder.build(&[0.1; 100], 44100).unwrap();
        assert!(track.is_empty());
    }

    #[test]
    fn tracks_tone_and_holds_through_silence() {
        let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();
        let samples = tone_then_silence(220.0, 44100, 2048 * 10, 2048 * 4);
        let track = builder.build(&samples, 44100).unwrap();
        assert_eq!(track.len(), 14);

        for p in &track.points()[..10] {
            assert!((p.hz - 220.0).abs() < 2.2, "hz {}", p.hz);
            assert!(p.rms > 0.3);
        }
        let held = track.points()[9].hz;
        for p in &track.points()[10..] {
            assert_eq!(p.hz, held);
            assert_eq!(p.rms, 0.0);
        }
    }

    #[test]
    fn building_twice_is_byte_identical() {
        let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();
        let samples = tone_then_silence(330.0, 44100, 2048 * 8, 2048 * 2);
        let a = builder.build(&samples, 44100).unwrap().to_json().unwrap();
        let b = builder.build(&samples, 44100).unwrap().to_json().unwrap();
        assert_eq!(a, b);

        let fresh = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();
        assert_eq!(fresh.build(&samples, 44100).unwrap().to_json().unwrap(), a);
    }

    #[test]
    fn rejects_bad_parameters() {
        let config = BuilderConfig {
            hop_size: 0,
            ..BuilderConfig::default()
        };
        assert!(ReferenceTrackBuilder::new(config).is_err());

        let builder = ReferenceTrackBuilder::new(BuilderConfig::default()).unwrap();
        assert!(builder.build(&[0.0; 4096], 0).is_err());
    }
}
