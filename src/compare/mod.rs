pub mod comparator;
pub mod score;

pub use comparator::{Interpolation, LiveComparator, Lookup};
pub use score::{ComparisonResult, Scoring, ScoringMode, Tuning};
