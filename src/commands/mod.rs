mod compare;
mod inspect;
mod locate;

pub use compare::run_compare;
pub use inspect::{run_boxes, run_contrast, run_features, run_hash};
pub use locate::run_locate;
