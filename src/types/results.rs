//! Result types produced by the matchers.
//!
//! These are immutable values: matchers build them, the orchestrator only
//! reads them for threshold comparison.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::core::{Point, Region};

/// Best location of a needle inside a haystack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Normalized cross-correlation score, nominally in [-1, 1]
    pub score: f64,
    /// Top-left corner of the match in haystack coordinates
    pub top_left: Point,
    /// Matched area in haystack coordinates
    pub region: Region,
    /// Scale applied to the needle to produce this match
    pub scale_used: f64,
}

/// Planar 3x3 projective transform mapping object points into the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography(pub [[f64; 3]; 3]);

impl Homography {
    /// Map a point through the transform. `None` when the point lands on the
    /// line at infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let h = &self.0;
        let w = h[2][0] * x + h[2][1] * y + h[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        let px = (h[0][0] * x + h[0][1] * y + h[0][2]) / w;
        let py = (h[1][0] * x + h[1][1] * y + h[1][2]) / w;
        Some((px, py))
    }
}

/// Outcome of feature-based matching.
///
/// `transform == None` means no reliable correspondence was found. That is a
/// valid low-confidence result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomographyResult {
    /// Inliers divided by accepted correspondences, in [0, 1]
    pub inlier_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Homography>,
    /// Correspondences that passed the ratio test
    pub correspondences: usize,
    /// Correspondences consistent with the transform
    pub inliers: usize,
}

impl HomographyResult {
    pub fn none(correspondences: usize) -> Self {
        Self {
            inlier_ratio: 0.0,
            transform: None,
            correspondences,
            inliers: 0,
        }
    }

    pub fn found(&self) -> bool {
        self.transform.is_some()
    }
}

/// Masked pixel diff.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Heatmap blended over the actual image; visualization only
    pub overlay: RgbImage,
    /// Percentage of pixels that changed after masking and binarization, in [0, 100]
    pub changed_pct: f64,
    pub changed_pixels: u64,
    pub total_pixels: u64,
}
