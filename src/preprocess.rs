//! Shared preprocessing for every matcher.
//!
//! All helpers allocate new buffers; caller images are never mutated.

use std::sync::{Once, OnceLock};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::VraError;
use crate::Result;

static INIT: Once = Once::new();
static BRIEF_PATTERN: OnceLock<Vec<SamplePair>> = OnceLock::new();

const BRIEF_PAIRS: usize = 256;
const BRIEF_PATCH_HALF: i32 = 13;
const BRIEF_SEED: u64 = 0x5eed_0b71;

/// One BRIEF intensity test: compare pixel `a` against pixel `b`, both as
/// offsets from the keypoint centre before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePair {
    pub a: (i32, i32),
    pub b: (i32, i32),
}

/// One-time process-wide setup of the image-processing tables.
///
/// Safe to call repeatedly and from several threads; only the first call
/// does any work. Every public matcher calls this on entry.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        let pattern = brief_pattern();
        debug!(pairs = pattern.len(), "image processing tables initialized");
    });
}

/// Sampling pattern used for binary descriptors, generated from a fixed seed
/// so descriptors are stable across runs.
pub fn brief_pattern() -> &'static [SamplePair] {
    BRIEF_PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(BRIEF_SEED);
        let mut coord = || {
            (
                rng.gen_range(-BRIEF_PATCH_HALF..=BRIEF_PATCH_HALF),
                rng.gen_range(-BRIEF_PATCH_HALF..=BRIEF_PATCH_HALF),
            )
        };
        (0..BRIEF_PAIRS)
            .map(|_| SamplePair {
                a: coord(),
                b: coord(),
            })
            .collect()
    })
}

/// Reject empty buffers before any algorithm touches them.
pub fn validate(image: &DynamicImage, name: &str) -> Result<()> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(VraError::invalid_image(name, (w, h)));
    }
    Ok(())
}

/// BT.601 luma, rounded to the nearest integer. Alpha is ignored.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, px) in rgb.enumerate_pixels() {
        let [r, g, b] = px.0;
        gray.put_pixel(x, y, Luma([luma_601(r, g, b)]));
    }
    gray
}

pub fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

/// Resize to exact dimensions with bilinear filtering. Same-size requests
/// return an untouched copy.
pub fn resize_exact(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Grayscale first, then resize, so the filter runs on one channel of final
/// luma values rather than on color channels that are rounded twice.
pub fn gray_resized(image: &DynamicImage, width: u32, height: u32) -> GrayImage {
    let gray = to_gray(image);
    if gray.dimensions() == (width, height) {
        return gray;
    }
    imageops::resize(&gray, width, height, FilterType::Triangle)
}

/// Kernel sizes that are odd and at least 3 enable blurring.
pub fn blur_enabled(kernel: u32) -> bool {
    kernel >= 3 && kernel % 2 == 1
}

/// Grayscale plane, optionally Gaussian-blurred with the given kernel size.
pub fn prepare_gray(image: &DynamicImage, blur_kernel: u32) -> Plane {
    let plane = Plane::from_gray(&to_gray(image));
    if blur_enabled(blur_kernel) {
        gaussian_blur(&plane, blur_kernel as usize, 0.0)
    } else {
        plane
    }
}

/// Single-channel floating point image.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_gray(gray: &GrayImage) -> Self {
        Self {
            width: gray.width() as usize,
            height: gray.height() as usize,
            data: gray.as_raw().iter().map(|&v| f64::from(v)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[y * self.width + x] = value;
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Plane {
        Plane {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Element-wise combination of two planes of equal size.
    pub fn zip_map(&self, other: &Plane, f: impl Fn(f64, f64) -> f64) -> Plane {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        Plane {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Round and saturate back to 8-bit.
    pub fn to_gray(&self) -> GrayImage {
        let raw = self
            .data
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        GrayImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| GrayImage::new(self.width as u32, self.height as u32))
    }
}

/// 1-D Gaussian kernel.
///
/// With `sigma <= 0` the sigma is derived from the size, and sizes 3, 5 and 7
/// use the fixed binomial-like tables common in image libraries.
pub fn gaussian_kernel(ksize: usize, sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        match ksize {
            1 => return vec![1.0],
            3 => return vec![0.25, 0.5, 0.25],
            5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
            7 => {
                return vec![
                    0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
                ]
            }
            _ => {}
        }
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (ksize as f64 - 1.0) / 2.0;
    let mut kernel: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur with reflect-101 borders.
pub fn gaussian_blur(plane: &Plane, ksize: usize, sigma: f64) -> Plane {
    let kernel = gaussian_kernel(ksize, sigma);
    let radius = (kernel.len() / 2) as isize;
    let (w, h) = (plane.width, plane.height);
    if w == 0 || h == 0 {
        return plane.clone();
    }

    let mut horizontal = Plane::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect101(x as isize + k as isize - radius, w);
                acc += weight * plane.get(sx, y);
            }
            horizontal.set(x, y, acc);
        }
    }

    let mut out = Plane::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect101(y as isize + k as isize - radius, h);
                acc += weight * horizontal.get(x, sy);
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Mirror an out-of-range index back into `[0, len)` without repeating the
/// edge sample (`gfedcb|abcdefgh|gfedcba`).
pub fn reflect101(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as isize;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn gray_resized_converts_before_resampling() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(37, 23, |x, y| {
            Rgb([(x * 6) as u8, (y * 11) as u8, ((x ^ y) * 5) as u8])
        }));
        let expected = imageops::resize(&to_gray(&img), 9, 8, FilterType::Triangle);
        assert_eq!(gray_resized(&img, 9, 8), expected);
        assert_eq!(gray_resized(&img, 37, 23), to_gray(&img));
    }

    #[test]
    fn ensure_initialized_is_idempotent() {
        ensure_initialized();
        ensure_initialized();
        let first = brief_pattern().as_ptr();
        std::thread::spawn(ensure_initialized)
            .join()
            .expect("init from another thread");
        assert_eq!(first, brief_pattern().as_ptr());
        assert_eq!(brief_pattern().len(), 256);
    }

    #[test]
    fn brief_pattern_stays_inside_patch() {
        for pair in brief_pattern() {
            for (x, y) in [pair.a, pair.b] {
                assert!(x.abs() <= BRIEF_PATCH_HALF && y.abs() <= BRIEF_PATCH_HALF);
            }
        }
    }

    #[test]
    fn validate_rejects_zero_dimension() {
        let empty = DynamicImage::new_rgb8(0, 10);
        let err = validate(&empty, "actual").unwrap_err();
        assert!(err.to_string().contains("0x10"));
        assert!(validate(&DynamicImage::new_rgb8(1, 1), "actual").is_ok());
    }

    #[test]
    fn gray_uses_bt601_weights() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        assert_eq!(to_gray(&img).get_pixel(0, 0).0[0], 76);
        assert_eq!(luma_601(255, 255, 255), 255);
    }

    #[test]
    fn kernels_are_normalized() {
        for (size, sigma) in [(3, 0.0), (7, 0.0), (9, 0.0), (11, 1.5)] {
            let k = gaussian_kernel(size, sigma);
            assert_eq!(k.len(), size);
            assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn blur_preserves_constant_plane() {
        let plane = Plane::from_gray(&GrayImage::from_pixel(6, 4, Luma([90])));
        let blurred = gaussian_blur(&plane, 5, 0.0);
        assert!(blurred.data().iter().all(|v| (v - 90.0).abs() < 1e-9));
    }

    #[test]
    fn reflect101_mirrors_without_edge_repeat() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(2, 5), 2);
        assert_eq!(reflect101(-3, 1), 0);
    }

    #[test]
    fn blur_enabled_only_for_odd_kernels_of_three_or_more() {
        assert!(!blur_enabled(0));
        assert!(!blur_enabled(1));
        assert!(!blur_enabled(4));
        assert!(blur_enabled(3));
        assert!(blur_enabled(11));
    }
}
