pub mod detector;
pub mod frame;
pub mod note;
pub mod smoother;

pub use detector::{AcfStrategy, DetectorConfig, PitchDetector, PitchEstimate};
pub use frame::{AudioFrame, FrameBuffer};
pub use smoother::{PitchSmoother, ResetPolicy, SmootherConfig};
