//! Hue/saturation histogram correlation for theme drift.
//!
//! Value (brightness) is left out so lighting changes do not register as a
//! theme change.

use image::DynamicImage;
use palette::{FromColor, Hsv, Srgb};

use crate::preprocess::{ensure_initialized, validate};
use crate::Result;

pub const HUE_BINS: usize = 50;
pub const SAT_BINS: usize = 60;

/// Pearson correlation of the two images' min-max normalized H-S histograms.
pub fn hsv_correlation(img1: &DynamicImage, img2: &DynamicImage) -> Result<f64> {
    ensure_initialized();
    validate(img1, "img1")?;
    validate(img2, "img2")?;

    let h1 = normalize(hs_histogram(img1));
    let h2 = normalize(hs_histogram(img2));
    Ok(correlation(&h1, &h2))
}

/// Joint histogram indexed `hue_bin * SAT_BINS + sat_bin`, using 8-bit HSV
/// ranges (hue 0..180, saturation 0..256).
pub fn hs_histogram(image: &DynamicImage) -> Vec<f64> {
    let mut hist = vec![0.0; HUE_BINS * SAT_BINS];
    for px in image.to_rgb8().pixels() {
        let [r, g, b] = px.0;
        let hsv = Hsv::from_color(Srgb::new(r, g, b).into_format::<f32>());
        // Hues just under 360 deg round up to 180; keep them in the last bin
        // next to their neighbours instead of wrapping to 0.
        let hue = ((hsv.hue.into_positive_degrees() / 2.0).round() as usize).min(179);
        let sat = ((hsv.saturation * 255.0).round() as usize).min(255);
        let hue_bin = hue * HUE_BINS / 180;
        let sat_bin = sat * SAT_BINS / 256;
        hist[hue_bin * SAT_BINS + sat_bin] += 1.0;
    }
    hist
}

/// Rescale to [0, 1]. A constant histogram maps to all zeros.
fn normalize(mut hist: Vec<f64>) -> Vec<f64> {
    let min = hist.iter().copied().fold(f64::INFINITY, f64::min);
    let max = hist.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    for v in &mut hist {
        *v = if range > 0.0 { (*v - min) / range } else { 0.0 };
    }
    hist
}

/// Pearson correlation; 1.0 when either side has no variance.
fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut num, mut da, mut db) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x - mean_a, y - mean_b);
        num += x * y;
        da += x * x;
        db += y * y;
    }
    let denom = (da * db).sqrt();
    if denom.abs() > f64::EPSILON {
        num / denom
    } else {
        1.0
    }
}
