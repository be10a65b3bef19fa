//! Visual Regression Assertions (VRA) Library
//!
//! Decides whether a captured screenshot has meaningfully diverged from a
//! baseline. The engine consumes already-captured images and combines several
//! independent comparisons into thresholded checks.
//!
//! # Module Overview
//!
//! - [`preprocess`] - Grayscale, blur and resize helpers shared by every matcher
//! - [`image_loader`] - Loading baselines, saving artifacts, cropping elements
//! - [`metrics`] - Matchers (template, feature, SSIM, histogram, hash, diff,
//!   contrast, layout) and the check orchestrator
//! - [`config`] - Thresholds, tuning knobs and enforcement policies
//! - [`types`] - Core data types
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use vra_lib::{default_checks, load_image, run_checks, CheckInputs, CheckKind, Config};
//!
//! # fn example() -> vra_lib::Result<()> {
//! let actual = load_image("artifacts/home.png")?;
//! let baseline = load_image("baselines/home.png")?;
//!
//! let config = Config::default();
//! let inputs = CheckInputs::new(&actual).with_baseline(&baseline);
//! let report = run_checks(
//!     &default_checks(&config),
//!     &[CheckKind::Ssim, CheckKind::Diff],
//!     &inputs,
//!     &config,
//! )?;
//! assert!(report.passed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod image_loader;
pub mod metrics;
pub mod output;
pub mod preprocess;
pub mod types;

pub use config::Config;
pub use error::{Result, VraError};
pub use image_loader::{
    center_color, crop_element, load_image, load_template_fitted, save_image, ElementRect,
};
pub use metrics::{
    default_checks, detect_boxes, dhash64, diff_with_mask, hamming, hsv_correlation,
    match_multi_scale, match_single_scale, match_template, match_with_homography, pixel_distance,
    run_checks, ssim, wcag_contrast_ratio, Check, CheckInputs, CheckReport, Matcher,
};
pub use output::{VraOutput, VRA_OUTPUT_VERSION};
pub use preprocess::ensure_initialized;
pub use types::{
    CheckKind, CheckOutcome, DiffResult, Enforcement, HomographyResult, MatchResult, Point,
    Region, Verdict,
};
