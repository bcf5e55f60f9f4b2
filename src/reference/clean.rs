use super::track::{round_to, ReferencePoint, ReferenceTrack};
use crate::error::{Result, TonicaError};

#[derive(Clone, Debug, PartialEq)]
pub struct CleanConfig {
    /// Points outside `(min_hz, max_hz)` are dropped.
    pub min_hz: f64,
    pub max_hz: f64,
    /// A point at least this far from its predecessor is dropped.
    pub max_jump_hz: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            min_hz: 80.0,
            max_hz: 1200.0,
            max_jump_hz: 200.0,
        }
    }
}

impl CleanConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_hz.is_finite() && self.max_hz.is_finite() && self.min_hz < self.max_hz) {
            return Err(TonicaError::invalid(format!(
                "guide range must satisfy min_hz < max_hz (got {}..{})",
                self.min_hz, self.max_hz
            )));
        }
        if !(self.max_jump_hz.is_finite() && self.max_jump_hz > 0.0) {
            return Err(TonicaError::invalid(format!(
                "max_jump_hz must be positive (got {})",
                self.max_jump_hz
            )));
        }
        Ok(())
    }
}

/// Turns a raw reference into a display guide: vocal-range filter, duplicate
/// timestamp removal, jump rejection and a 3-point moving average.
///
/// The output is still ordered by time but no longer sits on a fixed hop grid.
pub fn clean(track: &ReferenceTrack, config: &CleanConfig) -> ReferenceTrack {
    let in_range: Vec<ReferencePoint> = track
        .points()
        .iter()
        .filter(|p| p.hz > config.min_hz && p.hz < config.max_hz)
        .copied()
        .collect();

    // Each pass compares a point with its predecessor in that pass's input.
    let distinct = keep_against_previous(&in_range, |prev, p| prev.t != p.t);
    let kept = keep_against_previous(&distinct, |prev, p| {
        (p.hz - prev.hz).abs() < config.max_jump_hz
    });

    let smoothed = (0..kept.len())
        .map(|i| {
            let prev = if i > 0 { kept[i - 1].hz } else { kept[i].hz };
            let next = kept.get(i + 1).map_or(kept[i].hz, |p| p.hz);
            ReferencePoint {
                hz: round_to((prev + kept[i].hz + next) / 3.0, 2),
                ..kept[i]
            }
        })
        .collect();

    // Filtering a valid track only removes points, so ordering still holds.
    ReferenceTrack::from_points(smoothed).unwrap_or_default()
}

fn keep_against_previous(
    points: &[ReferencePoint],
    keep: impl Fn(&ReferencePoint, &ReferencePoint) -> bool,
) -> Vec<ReferencePoint> {
    points
        .iter()
        .enumerate()
        .filter(|&(i, p)| i == 0 || keep(&points[i - 1], p))
        .map(|(_, p)| *p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn track(points: &[(f64, f64)]) -> ReferenceTrack {
        ReferenceTrack::from_points(
            points
                .iter()
                .map(|&(t, hz)| ReferencePoint { t, hz, rms: 0.1 })
                .collect(),
        )
        .unwrap()
    }

    fn hz(track: &ReferenceTrack) -> Vec<f64> {
        track.points().iter().map(|p| p.hz).collect()
    }

    #[test]
    fn drops_out_of_range_and_duplicates() {
        let raw = track(&[(0.0, 0.0), (0.1, 300.0), (0.1, 310.0), (0.2, 1500.0), (0.3, 300.0)]);
        let cleaned = clean(&raw, &CleanConfig::default());
        let times: Vec<f64> = cleaned.points().iter().map(|p| p.t).collect();
        assert_eq!(times, vec![0.1, 0.3]);
        assert_eq!(hz(&cleaned), vec![300.0, 300.0]);
    }

    #[test]
    fn sustained_octave_jump_keeps_upper_passage() {
        let raw = track(&[
            (0.0, 220.0),
            (0.1, 220.0),
            (0.2, 440.0),
            (0.3, 440.0),
            (0.4, 440.0),
            (0.5, 440.0),
        ]);
        let cleaned = clean(&raw, &CleanConfig::default());
        let times: Vec<f64> = cleaned.points().iter().map(|p| p.t).collect();
        assert_eq!(times, vec![0.0, 0.1, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn isolated_spike_drops_spike_and_return() {
        // Both edges of a spike are jumps against their own predecessor.
        let raw = track(&[(0.0, 200.0), (0.1, 600.0), (0.2, 210.0), (0.3, 215.0)]);
        let cleaned = clean(&raw, &CleanConfig::default());
        let times: Vec<f64> = cleaned.points().iter().map(|p| p.t).collect();
        assert_eq!(times, vec![0.0, 0.3]);
    }

    #[test]
    fn rejects_unusable_jump_threshold() {
        for max_jump_hz in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let config = CleanConfig {
                max_jump_hz,
                ..CleanConfig::default()
            };
            assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidConfig);
        }
        let inverted = CleanConfig {
            min_hz: 500.0,
            max_hz: 100.0,
            ..CleanConfig::default()
        };
        assert!(inverted.validate().is_err());
        assert!(CleanConfig::default().validate().is_ok());
    }

    #[test]
    fn averages_neighbours() {
        let raw = track(&[(0.0, 200.0), (0.1, 230.0), (0.2, 260.0)]);
        let cleaned = clean(&raw, &CleanConfig::default());
        assert_eq!(hz(&cleaned), vec![210.0, 230.0, 250.0]);
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(clean(&ReferenceTrack::default(), &CleanConfig::default()).is_empty());
    }
}
