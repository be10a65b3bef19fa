mod checks;
mod core;
mod results;

pub use self::checks::{CheckKind, CheckOutcome, Comparison, Enforcement, Verdict};
pub use self::core::{Point, Region};
pub use self::results::{DiffResult, Homography, HomographyResult, MatchResult};
