//! Masked pixel diff with a heatmap overlay.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgb, RgbImage};

use crate::preprocess::{ensure_initialized, luma_601, resize_exact, validate};
use crate::types::DiffResult;
use crate::Result;

/// Overlay blend weights. They sum above 1.0, so highlighted pixels can
/// saturate; the overlay is for humans only and never feeds `changed_pct`.
pub const OVERLAY_ACTUAL_WEIGHT: f64 = 0.7;
pub const OVERLAY_HEAT_WEIGHT: f64 = 0.6;

/// Diff `actual` against `baseline`, ignoring pixels where `mask` is zero.
///
/// The baseline and mask are resized to the actual image's size when they
/// differ. Diff intensities at or below `noise_threshold` are dropped.
pub fn diff_with_mask(
    actual: &DynamicImage,
    baseline: &DynamicImage,
    mask: Option<&DynamicImage>,
    noise_threshold: u8,
) -> Result<DiffResult> {
    ensure_initialized();
    validate(actual, "actual")?;
    validate(baseline, "baseline")?;
    if let Some(mask) = mask {
        validate(mask, "mask")?;
    }

    let (w, h) = actual.dimensions();
    let actual_rgb = actual.to_rgb8();
    let baseline_rgb = resize_exact(baseline, w, h).to_rgb8();
    let mask_gray = mask.map(|m| resize_exact(m, w, h).to_luma8());

    let mut binary = GrayImage::new(w, h);
    let mut changed = 0u64;
    for (x, y, a) in actual_rgb.enumerate_pixels() {
        let b = baseline_rgb.get_pixel(x, y);
        let d = |i: usize| a.0[i].abs_diff(b.0[i]);
        let mut magnitude = luma_601(d(0), d(1), d(2));
        if let Some(mask) = &mask_gray {
            magnitude &= mask.get_pixel(x, y).0[0];
        }
        if magnitude > noise_threshold {
            binary.put_pixel(x, y, Luma([255]));
            changed += 1;
        }
    }

    let total = u64::from(w) * u64::from(h);
    Ok(DiffResult {
        overlay: overlay(&actual_rgb, &binary),
        changed_pct: 100.0 * changed as f64 / total as f64,
        changed_pixels: changed,
        total_pixels: total,
    })
}

/// Paint the binary diff into the red channel and blend it over `actual`.
fn overlay(actual: &RgbImage, binary: &GrayImage) -> RgbImage {
    let blend = |base: u8, heat: u8| {
        (OVERLAY_ACTUAL_WEIGHT * f64::from(base) + OVERLAY_HEAT_WEIGHT * f64::from(heat))
            .round()
            .clamp(0.0, 255.0) as u8
    };
    RgbImage::from_fn(actual.width(), actual.height(), |x, y| {
        let [r, g, b] = actual.get_pixel(x, y).0;
        let heat = binary.get_pixel(x, y).0[0];
        Rgb([blend(r, heat), blend(g, 0), blend(b, 0)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([v, v, v])))
    }

    #[test]
    fn identical_images_have_no_changes() {
        let img = solid(20, 20, 128);
        let result = diff_with_mask(&img, &img, None, 25).expect("diff");
        assert_eq!(result.changed_pct, 0.0);
        assert_eq!(result.total_pixels, 400);
    }

    #[test]
    fn mask_limits_changes_to_checked_region() {
        let actual = solid(100, 100, 0);
        let baseline = solid(100, 100, 255);
        let mut mask = GrayImage::new(100, 100);
        for y in 20..30 {
            for x in 50..60 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let result = diff_with_mask(
            &actual,
            &baseline,
            Some(&DynamicImage::ImageLuma8(mask)),
            25,
        )
        .expect("diff");
        assert_eq!(result.changed_pixels, 100);
        assert!((result.changed_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_zero_mask_reports_nothing() {
        let actual = solid(30, 20, 0);
        let baseline = solid(30, 20, 255);
        let mask = DynamicImage::ImageLuma8(GrayImage::new(30, 20));
        let result = diff_with_mask(&actual, &baseline, Some(&mask), 0).expect("diff");
        assert_eq!(result.changed_pct, 0.0);
    }

    #[test]
    fn differences_at_noise_floor_are_ignored() {
        let result = diff_with_mask(&solid(10, 10, 100), &solid(10, 10, 125), None, 25).expect("diff");
        assert_eq!(result.changed_pixels, 0);
        let result = diff_with_mask(&solid(10, 10, 100), &solid(10, 10, 126), None, 25).expect("diff");
        assert_eq!(result.changed_pixels, 100);
    }

    #[test]
    fn baseline_is_resized_to_actual() {
        let result = diff_with_mask(&solid(10, 10, 50), &solid(20, 5, 50), None, 25).expect("diff");
        assert_eq!(result.total_pixels, 100);
        assert_eq!(result.changed_pct, 0.0);
        assert_eq!(result.overlay.dimensions(), (10, 10));
    }

    #[test]
    fn overlay_saturates_changed_pixels() {
        let result = diff_with_mask(&solid(4, 4, 200), &solid(4, 4, 0), None, 25).expect("diff");
        let px = result.overlay.get_pixel(0, 0).0;
        // 0.7 * 200 + 0.6 * 255 = 293 -> clamped.
        assert_eq!(px, [255, 140, 140]);
    }
}
