use std::sync::Arc;

use crate::error::{Result, TonicaError};
use crate::reference::ReferenceTrack;

use super::score::{ComparisonResult, Scoring};

/// How the expected pitch is read off the reference between its points.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Interpolation {
    /// Value of the nearest preceding point.
    #[default]
    Step,
    /// Linear between bracketing points, then an exponential pass across
    /// successive lookups. `smoothing` is the weight of the new value.
    Linear { smoothing: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup {
    /// No reference loaded for the current song.
    NoReference,
    /// Transport time is still inside the song's manual lead-in.
    NotSynchronized,
    /// `None` when the reference has no pitch at that point.
    Expected(Option<f64>),
}

impl Lookup {
    pub fn hz(&self) -> Option<f64> {
        match self {
            Lookup::Expected(hz) => *hz,
            _ => None,
        }
    }
}

/// Aligns transport time with a loaded reference track and scores the live
/// pitch against it.
pub struct LiveComparator {
    track: Option<Arc<ReferenceTrack>>,
    offset: f64,
    interpolation: Interpolation,
    scoring: Scoring,
    smoothed: Option<f64>,
}

impl LiveComparator {
    pub fn new(interpolation: Interpolation, scoring: Scoring) -> Result<Self> {
        if let Interpolation::Linear { smoothing } = interpolation {
            if !(smoothing > 0.0 && smoothing <= 1.0) {
                return Err(TonicaError::invalid(format!(
                    "linear smoothing must be within (0, 1], got {}",
                    smoothing
                )));
            }
        }
        scoring.validate()?;
        Ok(Self {
            track: None,
            offset: 0.0,
            interpolation,
            scoring,
            smoothed: None,
        })
    }

    /// Installs a track; `offset` seconds are subtracted from transport time
    /// before every lookup.
    pub fn load(&mut self, track: Arc<ReferenceTrack>, offset: f64) {
        self.track = Some(track);
        self.offset = offset;
        self.smoothed = None;
    }

    pub fn unload(&mut self) {
        self.track = None;
        self.offset = 0.0;
        self.smoothed = None;
    }

    pub fn track(&self) -> Option<&Arc<ReferenceTrack>> {
        self.track.as_ref()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn scoring(&self) -> &Scoring {
        &self.scoring
    }

    pub fn expected_at(&mut self, transport_time: f64) -> Lookup {
        let Some(track) = self.track.as_ref().filter(|t| !t.is_empty()) else {
            return Lookup::NoReference;
        };

        let t = transport_time - self.offset;
        if !t.is_finite() || t < 0.0 {
            self.smoothed = None;
            return Lookup::NotSynchronized;
        }

        let points = track.points();
        let next_idx = track.partition(t);
        // Past the end this clamps to the final point.
        let prev = &points[next_idx.saturating_sub(1)];

        match self.interpolation {
            Interpolation::Step => Lookup::Expected(voiced(prev.hz)),
            Interpolation::Linear { smoothing } => {
                let next = points.get(next_idx).unwrap_or(prev);
                let hz = match (voiced(prev.hz), voiced(next.hz)) {
                    (Some(a), Some(b)) => {
                        let span = (next.t - prev.t).max(1e-4);
                        let ratio = ((t - prev.t) / span).clamp(0.0, 1.0);
                        a + (b - a) * ratio
                    }
                    (Some(a), None) => a,
                    (None, _) => {
                        self.smoothed = None;
                        return Lookup::Expected(None);
                    }
                };
                let out = match self.smoothed {
                    Some(last) => last + (hz - last) * smoothing,
                    None => hz,
                };
                self.smoothed = Some(out);
                Lookup::Expected(Some(out))
            }
        }
    }

    pub fn compare(&mut self, transport_time: f64, live_hz: Option<f64>) -> ComparisonResult {
        let expected = self.expected_at(transport_time).hz();
        self.scoring.score(live_hz, expected)
    }
}

fn voiced(hz: f64) -> Option<f64> {
    (hz > 0.0).then_some(hz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferencePoint;

    fn track() -> Arc<ReferenceTrack> {
        let points = [(0.0, 200.0), (0.5, 220.0), (1.0, 300.0), (1.5, 400.0), (2.0, 0.0)]
            .iter()
            .map(|&(t, hz)| ReferencePoint { t, hz, rms: 0.1 })
            .collect();
        Arc::new(ReferenceTrack::from_points(points).unwrap())
    }

    fn step() -> LiveComparator {
        let mut c = LiveComparator::new(Interpolation::Step, Scoring::default()).unwrap();
        c.load(track(), 0.0);
        c
    }

    #[test]
    fn offset_gates_until_lead_in_passes() {
        let mut c = step();
        c.load(track(), 5.0);
        assert_eq!(c.expected_at(3.0), Lookup::NotSynchronized);
        assert_eq!(c.expected_at(6.0), Lookup::Expected(Some(300.0)));

        let r = c.compare(3.0, Some(250.0));
        assert_eq!(r.expected_hz, None);
        assert_eq!(r.precision, None);
    }

    #[test]
    fn step_uses_preceding_point() {
        let mut c = step();
        assert_eq!(c.expected_at(0.0).hz(), Some(200.0));
        assert_eq!(c.expected_at(0.49).hz(), Some(200.0));
        assert_eq!(c.expected_at(0.5).hz(), Some(220.0));
        assert_eq!(c.expected_at(1.7).hz(), Some(400.0));
    }

    #[test]
    fn clamps_past_end_and_reports_unvoiced() {
        let mut c = step();
        assert_eq!(c.expected_at(100.0), Lookup::Expected(None));
    }

    #[test]
    fn no_reference_loaded() {
        let mut c = LiveComparator::new(Interpolation::Step, Scoring::default()).unwrap();
        assert_eq!(c.expected_at(1.0), Lookup::NoReference);
        c.load(Arc::new(ReferenceTrack::default()), 0.0);
        assert_eq!(c.expected_at(1.0), Lookup::NoReference);
        c.load(track(), 0.0);
        c.unload();
        assert_eq!(c.compare(1.0, Some(300.0)).expected_hz, None);
    }

    #[test]
    fn linear_interpolates_then_smooths() {
        let mut c =
            LiveComparator::new(Interpolation::Linear { smoothing: 0.2 }, Scoring::default())
                .unwrap();
        c.load(track(), 0.0);

        // First lookup seeds the smoother with the interpolated value.
        let first = c.expected_at(0.75).hz().unwrap();
        assert!((first - 260.0).abs() < 1e-9);

        // Next lookup moves 20% of the way towards the new target.
        let second = c.expected_at(1.25).hz().unwrap();
        assert!((second - (260.0 + (350.0 - 260.0) * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn linear_with_offset_reads_reference_time() {
        let mut c =
            LiveComparator::new(Interpolation::Linear { smoothing: 0.2 }, Scoring::default())
                .unwrap();
        c.load(track(), 5.0);
        assert_eq!(c.expected_at(3.0), Lookup::NotSynchronized);
        assert_eq!(c.expected_at(6.0).hz(), Some(300.0));
    }

    #[test]
    fn linear_holds_into_unvoiced_tail() {
        let mut c =
            LiveComparator::new(Interpolation::Linear { smoothing: 1.0 }, Scoring::default())
                .unwrap();
        c.load(track(), 0.0);
        assert_eq!(c.expected_at(1.75).hz(), Some(400.0));
        assert_eq!(c.expected_at(2.5).hz(), None);
    }

    #[test]
    fn scores_against_expected() {
        let mut c = step();
        let r = c.compare(0.6, Some(225.0));
        assert_eq!(r.expected_hz, Some(220.0));
        assert_eq!(r.delta_hz, Some(5.0));
        assert!((r.precision.unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_smoothing() {
        let bad = LiveComparator::new(Interpolation::Linear { smoothing: 0.0 }, Scoring::default());
        assert!(bad.is_err());
    }
}
