use std::path::{Path, PathBuf};

use crate::audio::decode::decode_audio;
use crate::error::{Result, TonicaError};

use super::builder::ReferenceTrackBuilder;
use super::clean::{clean, CleanConfig};
use super::track::ReferenceTrack;

/// Songs live in one directory, their reference tracks in another, keyed by
/// the song's base name: `song.mp3` -> `song_ref.json`.
#[derive(Clone, Debug)]
pub struct ReferenceStore {
    songs_dir: PathBuf,
    references_dir: PathBuf,
}

impl ReferenceStore {
    pub fn new(songs_dir: impl Into<PathBuf>, references_dir: impl Into<PathBuf>) -> Self {
        Self {
            songs_dir: songs_dir.into(),
            references_dir: references_dir.into(),
        }
    }

    pub fn songs_dir(&self) -> &Path {
        &self.songs_dir
    }

    pub fn references_dir(&self) -> &Path {
        &self.references_dir
    }

    pub fn song_path(&self, song: &str) -> Result<PathBuf> {
        // Only bare file names; no escaping the songs directory.
        let plain = Path::new(song).file_name().and_then(|n| n.to_str()) == Some(song);
        if !plain || song.is_empty() {
            return Err(TonicaError::InputNotFound {
                path: self.songs_dir.join(song),
            });
        }
        Ok(self.songs_dir.join(song))
    }

    pub fn reference_path(&self, song: &str) -> PathBuf {
        self.references_dir
            .join(format!("{}_ref.json", song_base_name(song)))
    }

    pub fn guide_path(&self, song: &str) -> PathBuf {
        self.references_dir
            .join(format!("{}_guide.json", song_base_name(song)))
    }

    /// Decodes `song`, builds its reference track and persists it. Nothing is
    /// written unless the whole build succeeds.
    pub fn build(&self, song: &str, builder: &ReferenceTrackBuilder) -> Result<PathBuf> {
        let input = self.song_path(song)?;
        log::info!("Analyzing {}", input.display());

        let audio = decode_audio(&input)?;
        let track = builder.build_from_audio(&audio)?;

        let out = self.reference_path(song);
        track.write(&out)?;
        log::info!("Reference written: {} ({} points)", out.display(), track.len());
        Ok(out)
    }

    pub fn load(&self, song: &str) -> Result<ReferenceTrack> {
        ReferenceTrack::read(&self.reference_path(song))
    }

    /// Writes a cleaned display guide next to the stored reference.
    pub fn write_guide(&self, song: &str, config: &CleanConfig) -> Result<PathBuf> {
        config.validate()?;
        let track = self.load(song)?;
        let guide = clean(&track, config);
        let out = self.guide_path(song);
        guide.write(&out)?;
        log::info!(
            "Guide written: {} ({} of {} points kept)",
            out.display(),
            guide.len(),
            track.len()
        );
        Ok(out)
    }
}

/// File name without its last extension.
pub fn song_base_name(song: &str) -> &str {
    Path::new(song)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(song)
}
