use std::fs;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageError};
use palette::Srgb;
use thiserror::Error;
use tracing::debug;

use crate::preprocess::resize_exact;
use crate::types::{Point, Region};

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("Failed to load image: {0}")]
    Load(#[from] ImageError),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Failed to save image: {0}")]
    Save(String),
}

pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, ImageLoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ImageLoadError::NotFound(path.display().to_string()));
    }
    Ok(image::open(path)?)
}

/// Write an image, creating parent directories as needed.
pub fn save_image(image: &DynamicImage, path: impl AsRef<Path>) -> Result<(), ImageLoadError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ImageLoadError::Save(e.to_string()))?;
    }
    image
        .save(path)
        .map_err(|e| ImageLoadError::Save(format!("{}: {}", path.display(), e)))
}

/// Shrink `template` uniformly so it fits inside `bounds`. Templates that
/// already fit are returned unchanged; templates are never enlarged.
pub fn fit_within(template: &DynamicImage, bounds: (u32, u32)) -> DynamicImage {
    let (tw, th) = template.dimensions();
    let (bw, bh) = bounds;
    if tw <= bw && th <= bh {
        return template.clone();
    }
    let scale = (f64::from(bw) / f64::from(tw)).min(f64::from(bh) / f64::from(th));
    let new_w = ((f64::from(tw) * scale).round() as u32).clamp(1, bw.max(1));
    let new_h = ((f64::from(th) * scale).round() as u32).clamp(1, bh.max(1));
    debug!(
        from = %format!("{}x{}", tw, th),
        to = %format!("{}x{}", new_w, new_h),
        scale,
        "shrinking template to fit haystack"
    );
    resize_exact(template, new_w, new_h)
}

/// Load a template from disk and shrink it to fit `haystack` if needed.
pub fn load_template_fitted(
    path: impl AsRef<Path>,
    haystack: &DynamicImage,
) -> Result<DynamicImage, ImageLoadError> {
    let template = load_image(path)?;
    Ok(fit_within(&template, haystack.dimensions()))
}

/// Rectangle in CSS pixels, as reported by a page before device scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale a CSS-pixel rectangle by the device pixel ratio and clamp it into
/// the screenshot. `None` only for an empty screenshot.
pub fn element_region(
    rect: ElementRect,
    device_pixel_ratio: f64,
    bounds: (u32, u32),
) -> Option<Region> {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    Region::clamped(
        (rect.x * dpr).round() as i64,
        (rect.y * dpr).round() as i64,
        (rect.width * dpr).round() as i64,
        (rect.height * dpr).round() as i64,
        bounds,
    )
}

/// Crop an element out of a full screenshot.
pub fn crop_element(
    screenshot: &DynamicImage,
    rect: ElementRect,
    device_pixel_ratio: f64,
) -> Option<DynamicImage> {
    let region = element_region(rect, device_pixel_ratio, screenshot.dimensions())?;
    Some(screenshot.crop_imm(region.x, region.y, region.width, region.height))
}

/// Colour at `point`, or `None` when it lies outside the image.
pub fn sample_color(image: &DynamicImage, point: Point) -> Option<Srgb<u8>> {
    let (w, h) = image.dimensions();
    if point.x >= w || point.y >= h {
        return None;
    }
    let [r, g, b, _] = image.get_pixel(point.x, point.y).0;
    Some(Srgb::new(r, g, b))
}

/// Colour of the centre pixel.
pub fn center_color(image: &DynamicImage) -> Option<Srgb<u8>> {
    let (w, h) = image.dimensions();
    sample_color(image, Point { x: w / 2, y: h / 2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_image("/nonexistent/path/image.png");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ImageLoadError::NotFound(_)));
    }

    #[test]
    fn save_image_creates_parent_directories() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("artifacts/nested/out.png");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255])));

        save_image(&img, &path).expect("save image");

        let loaded = load_image(&path).expect("reload image");
        assert_eq!(loaded.dimensions(), (4, 3));
    }

    #[test]
    fn fit_within_shrinks_uniformly() {
        let template = DynamicImage::new_rgb8(400, 100);
        let fitted = fit_within(&template, (200, 200));
        assert_eq!(fitted.dimensions(), (200, 50));

        let small = DynamicImage::new_rgb8(10, 10);
        assert_eq!(fit_within(&small, (200, 200)).dimensions(), (10, 10));
    }

    #[test]
    fn load_template_fitted_reports_missing_path() {
        let haystack = DynamicImage::new_rgb8(10, 10);
        let err = load_template_fitted("/no/such/template.png", &haystack).unwrap_err();
        assert!(err.to_string().contains("/no/such/template.png"));
    }

    #[test]
    fn element_region_applies_device_pixel_ratio_and_clamps() {
        let rect = ElementRect {
            x: 10.0,
            y: 20.0,
            width: 300.0,
            height: 15.0,
        };
        let region = element_region(rect, 2.0, (400, 300)).expect("region");
        assert_eq!(region, Region::new(20, 40, 380, 30).unwrap());
    }

    #[test]
    fn crop_element_handles_out_of_range_rect() {
        let shot = DynamicImage::new_rgb8(50, 40);
        let rect = ElementRect {
            x: -5.0,
            y: 100.0,
            width: 0.0,
            height: 0.0,
        };
        let crop = crop_element(&shot, rect, 1.0).expect("crop");
        assert_eq!(crop.dimensions(), (1, 1));
    }

    #[test]
    fn center_color_reads_middle_pixel() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([0, 0, 0]));
        img.put_pixel(2, 2, Rgb([255, 165, 0]));
        let color = center_color(&DynamicImage::ImageRgb8(img)).expect("color");
        assert_eq!((color.red, color.green, color.blue), (255, 165, 0));
        assert!(sample_color(&DynamicImage::new_rgb8(2, 2), Point { x: 2, y: 0 }).is_none());
    }
}
