pub mod builder;
pub mod clean;
pub mod store;
pub mod track;

pub use builder::{BuilderConfig, ReferenceTrackBuilder};
pub use clean::{clean, CleanConfig};
pub use store::{song_base_name, ReferenceStore};
pub use track::{ReferencePoint, ReferenceTrack};
