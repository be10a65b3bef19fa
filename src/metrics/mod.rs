//! Image comparison algorithms and the check orchestrator.
//!
//! Each matcher is a stateless function over caller-owned images:
//! - Template matching (normalized cross-correlation, multi-scale)
//! - Feature matching (oriented binary descriptors + RANSAC homography)
//! - Structural similarity (SSIM)
//! - Hue/saturation histogram correlation
//! - Difference hash
//! - Masked pixel diff
//! - WCAG contrast ratio
//! - Layout box detection
//!
//! The [`runner`] composes them into independently thresholded checks.

mod contrast;
mod diff;
mod feature;
mod hash;
mod histogram;
mod homography;
mod layout;
mod matcher;
mod runner;
mod ssim;
mod template;


pub use contrast::{parse_hex_color, relative_luminance, to_hex, wcag_contrast_ratio};
pub use diff::{diff_with_mask, OVERLAY_ACTUAL_WEIGHT, OVERLAY_HEAT_WEIGHT};
pub use feature::{extract, match_with_homography, ratio_matches, Descriptor, Features, Keypoint};
pub use hash::{dhash64, hamming};
pub use histogram::{hs_histogram, hsv_correlation, HUE_BINS, SAT_BINS};
pub use homography::{find_homography, RansacFit};
pub use layout::{
    canny, detect_boxes, external_components, horizontal_gaps, pixel_distance, CANNY_HIGH,
    CANNY_LOW, MIN_BOX_AREA,
};
pub use matcher::{FeatureMatcher, Located, Matcher, TemplateMatcher};
pub use runner::{
    default_checks, run_checks, Artifact, Check, CheckInputs, CheckReport, ContrastCheck,
    DiffCheck, HashCheck, MatcherCheck, Measurement, SsimCheck, ThemeCheck,
};
pub use ssim::ssim;
pub use template::{match_multi_scale, match_single_scale, match_template, MIN_NEEDLE_SIDE};
