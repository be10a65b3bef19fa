use image::{DynamicImage, GenericImageView};

use crate::preprocess::{ensure_initialized, gaussian_blur, gray_resized, to_gray, validate, Plane};
use crate::Result;

const WINDOW: usize = 11;
const SIGMA: f64 = 1.5;
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Mean structural similarity over Gaussian-weighted 11x11 windows.
///
/// `img1` fixes the comparison size; `img2` is resized to it when the
/// dimensions differ.
pub fn ssim(img1: &DynamicImage, img2: &DynamicImage) -> Result<f64> {
    ensure_initialized();
    validate(img1, "img1")?;
    validate(img2, "img2")?;

    let (w, h) = img1.dimensions();
    let a = Plane::from_gray(&to_gray(img1));
    let b = Plane::from_gray(&gray_resized(img2, w, h));
    Ok(ssim_planes(&a, &b))
}

// Window statistics accumulate in f64, so scores can differ from
// single-precision implementations in the last few decimal places.
fn ssim_planes(a: &Plane, b: &Plane) -> f64 {
    let blur = |p: &Plane| gaussian_blur(p, WINDOW, SIGMA);

    let mu1 = blur(a);
    let mu2 = blur(b);
    let a_sq = blur(&a.map(|v| v * v));
    let b_sq = blur(&b.map(|v| v * v));
    let ab = blur(&a.zip_map(b, |x, y| x * y));

    let mut total = 0.0;
    for i in 0..mu1.data().len() {
        let (m1, m2) = (mu1.data()[i], mu2.data()[i]);
        let s1 = a_sq.data()[i] - m1 * m1;
        let s2 = b_sq.data()[i] - m2 * m2;
        let s12 = ab.data()[i] - m1 * m2;
        total += ((2.0 * m1 * m2 + C1) * (2.0 * s12 + C2))
            / ((m1 * m1 + m2 * m2 + C1) * (s1 + s2 + C2));
    }
    total / mu1.data().len() as f64
}
