//! Real-time pitch tracking for karaoke: an autocorrelation pitch detector,
//! an offline reference-track builder that runs the same detector over a
//! whole song, and a comparator that scores live pitch against that track.

pub mod audio;
pub mod compare;
pub mod config;
pub mod error;
pub mod pitch;
pub mod reference;
pub mod session;

pub use error::{ErrorKind, Result, TonicaError};
