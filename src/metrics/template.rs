//! Normalized cross-correlation template matching, single- and multi-scale.

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::config::TemplateOptions;
use crate::error::VraError;
use crate::preprocess::{ensure_initialized, prepare_gray, resize_exact, validate, Plane};
use crate::types::{MatchResult, Region};
use crate::Result;

/// Scaled needles smaller than this in either dimension carry too little
/// signal; the multi-scale sweep stops once it gets here.
pub const MIN_NEEDLE_SIDE: u32 = 5;

/// Locate `needle` in `haystack` at its native size.
///
/// Fails with [`VraError::SizeMismatch`] when the needle is larger than the
/// haystack in either dimension. Ties are resolved in raster order.
pub fn match_single_scale(
    haystack: &DynamicImage,
    needle: &DynamicImage,
    blur_kernel: u32,
) -> Result<MatchResult> {
    ensure_initialized();
    validate(haystack, "haystack")?;
    validate(needle, "needle")?;

    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw > hw || nh > hh {
        return Err(VraError::size_mismatch((hw, hh), (nw, nh)));
    }

    let hay = SearchSurface::new(prepare_gray(haystack, blur_kernel));
    let templ = prepare_gray(needle, blur_kernel);
    Ok(hay.best_match(&templ, 1.0))
}

/// Sweep the needle from `max_scale` down to `min_scale` and keep the best
/// match. A larger scale wins exact ties, so the sweep ends early once a
/// scale scores a perfect 1.0.
///
/// Each scale is a brute-force scan costing O(haystack area x scaled needle
/// area); keep haystacks to an element crop where possible.
pub fn match_multi_scale(
    haystack: &DynamicImage,
    needle: &DynamicImage,
    options: &TemplateOptions,
) -> Result<MatchResult> {
    ensure_initialized();
    options.validate()?;
    validate(haystack, "haystack")?;
    validate(needle, "needle")?;

    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    let hay = SearchSurface::new(prepare_gray(haystack, options.blur_kernel));

    let mut best: Option<MatchResult> = None;
    for scale in scales(options) {
        let sw = (f64::from(nw) * scale).round() as u32;
        let sh = (f64::from(nh) * scale).round() as u32;
        if sw < MIN_NEEDLE_SIDE || sh < MIN_NEEDLE_SIDE {
            debug!(scale, width = sw, height = sh, "needle below minimum size, stopping sweep");
            break;
        }
        if sw > hw || sh > hh {
            debug!(scale, width = sw, height = sh, "needle larger than haystack, skipping scale");
            continue;
        }

        let scaled = resize_exact(needle, sw, sh);
        let templ = prepare_gray(&scaled, options.blur_kernel);
        let candidate = hay.best_match(&templ, scale);
        debug!(scale, score = candidate.score, "template score");

        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
        if candidate.score >= 1.0 {
            debug!(scale, "perfect match, ending sweep");
            break;
        }
    }

    best.ok_or_else(|| VraError::no_feasible_scale((hw, hh), (nw, nh)))
}

/// Multi-scale search with the default sweep (1.0 down to 0.35, blur 3).
pub fn match_template(haystack: &DynamicImage, needle: &DynamicImage) -> Result<MatchResult> {
    match_multi_scale(haystack, needle, &TemplateOptions::default())
}

/// Descending scale sequence of `floor((max - min) / step) + 1` entries. The
/// small tolerance keeps `min_scale` itself in the sweep despite floating
/// point error in the division.
fn scales(options: &TemplateOptions) -> impl Iterator<Item = f64> {
    let TemplateOptions {
        max_scale,
        min_scale,
        step,
        ..
    } = *options;
    // `as` saturates, so a vanishing step yields a long but finite sweep.
    let count = (((max_scale - min_scale) / step + 1e-9).floor() as u64).saturating_add(1);
    (0..count).map(move |i| max_scale - i as f64 * step)
}

/// Haystack plane with integral images for constant-time window sums.
struct SearchSurface {
    plane: Plane,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl SearchSurface {
    fn new(plane: Plane) -> Self {
        let (w, h) = (plane.width(), plane.height());
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq_sum = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = plane.get(x, y);
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }
        Self { plane, sum, sq_sum }
    }

    fn window(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        table[(y + h) * stride + x + w] - table[y * stride + x + w] - table[(y + h) * stride + x]
            + table[y * stride + x]
    }

    /// Scan every offset in raster order and return the highest-scoring one;
    /// the first offset wins ties. The caller guarantees the template fits.
    ///
    /// Cost is O(haystack area x template area): window statistics come from
    /// the integral images but the numerator is summed per offset. The scan
    /// stops at the first perfect score since nothing later can beat it.
    fn best_match(&self, templ: &Plane, scale: f64) -> MatchResult {
        let (tw, th) = (templ.width(), templ.height());
        let n = (tw * th) as f64;
        let t_mean = templ.mean();
        let centered = templ.map(|v| v - t_mean);
        let t_norm = centered.data().iter().map(|v| v * v).sum::<f64>().sqrt();

        let stride = self.plane.width() + 1;
        let cols = self.plane.width() - tw + 1;
        let rows = self.plane.height() - th + 1;

        let mut best_score = f64::NEG_INFINITY;
        let mut best_at = (0usize, 0usize);
        'scan: for y in 0..rows {
            for x in 0..cols {
                let mut num = 0.0;
                for ty in 0..th {
                    let row = &self.plane.data()[(y + ty) * self.plane.width() + x..][..tw];
                    let t_row = &centered.data()[ty * tw..][..tw];
                    num += row.iter().zip(t_row).map(|(a, b)| a * b).sum::<f64>();
                }

                let s = Self::window(&self.sum, stride, x, y, tw, th);
                let s2 = Self::window(&self.sq_sum, stride, x, y, tw, th);
                let variance = (s2 - s * s / n).max(0.0);
                let score = normalize_score(num, variance, s2, t_norm);

                if score > best_score {
                    best_score = score;
                    best_at = (x, y);
                    if score >= 1.0 {
                        break 'scan;
                    }
                }
            }
        }

        let region = Region {
            x: best_at.0 as u32,
            y: best_at.1 as u32,
            width: tw as u32,
            height: th as u32,
        };
        MatchResult {
            score: best_score,
            top_left: region.top_left(),
            region,
            scale_used: scale,
        }
    }
}

/// Correlation coefficient from the raw numerator.
///
/// A window whose variance is within rounding noise of zero, or a flat
/// template (`t_norm == 0`), has no defined correlation and scores 0.
/// Otherwise Cauchy-Schwarz bounds `|num|` by the denominator, so anything
/// past +/-1 is rounding error and is clamped.
fn normalize_score(num: f64, window_variance: f64, window_sq_sum: f64, t_norm: f64) -> f64 {
    let tolerance = (10.0 * f64::from(f32::EPSILON) * window_sq_sum).min(0.5);
    if window_variance <= tolerance || t_norm == 0.0 {
        return 0.0;
    }
    (num / (window_variance.sqrt() * t_norm)).clamp(-1.0, 1.0)
}
