use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TonicaError};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// Seconds from song start.
    pub t: f64,
    /// Smoothed pitch; `0.0` where the song has no pitch yet.
    pub hz: f64,
    pub rms: f64,
}

/// Timestamped pitch series for a whole song, ordered by `t`.
///
/// Persisted as a plain JSON array of `{t, hz, rms}` records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ReferencePoint>", into = "Vec<ReferencePoint>")]
pub struct ReferenceTrack {
    points: Vec<ReferencePoint>,
}

impl TryFrom<Vec<ReferencePoint>> for ReferenceTrack {
    type Error = String;

    fn try_from(points: Vec<ReferencePoint>) -> std::result::Result<Self, Self::Error> {
        for (i, p) in points.iter().enumerate() {
            if !(p.t.is_finite() && p.hz.is_finite() && p.rms.is_finite()) {
                return Err(format!("point {} has a non-finite field", i));
            }
            if p.t < 0.0 || p.hz < 0.0 || p.rms < 0.0 {
                return Err(format!("point {} has a negative field", i));
            }
        }
        if let Some(i) = points.windows(2).position(|w| w[1].t < w[0].t) {
            return Err(format!(
                "timestamps go backwards at point {} ({} after {})",
                i + 1,
                points[i + 1].t,
                points[i].t
            ));
        }
        Ok(Self { points })
    }
}

impl From<ReferenceTrack> for Vec<ReferencePoint> {
    fn from(track: ReferenceTrack) -> Self {
        track.points
    }
}

impl ReferenceTrack {
    pub fn from_points(points: Vec<ReferencePoint>) -> Result<Self> {
        Self::try_from(points).map_err(TonicaError::invalid)
    }

    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&ReferencePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&ReferencePoint> {
        self.points.last()
    }

    /// Timestamp of the last point, or zero for an empty track.
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.t)
    }

    /// Number of points with `t <= time`; the index of the first later point.
    pub fn partition(&self, time: f64) -> usize {
        self.points.partition_point(|p| p.t <= time)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.points)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TonicaError::ReferenceNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&json)
    }

    /// Writes through a sibling temporary file so a failed write never leaves
    /// a truncated track behind.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Rounds to a fixed number of decimals for stable persisted output.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
