//! One interface over template and feature matching so callers can treat
//! both strategies alike.

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use super::feature::match_with_homography;
use super::template::{match_multi_scale, match_single_scale};
use crate::config::{FeatureOptions, TemplateOptions};
use crate::types::{Homography, Region};
use crate::Result;

/// Result of locating an object in a scene, whichever algorithm produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Located {
    /// Template score or feature inlier ratio
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Homography>,
}

pub trait Matcher {
    fn name(&self) -> &'static str;
    fn locate(&self, scene: &DynamicImage, object: &DynamicImage) -> Result<Located>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher {
    pub options: TemplateOptions,
    /// Match only at native size instead of sweeping scales
    pub single_scale: bool,
}

impl Matcher for TemplateMatcher {
    fn name(&self) -> &'static str {
        "template"
    }

    fn locate(&self, scene: &DynamicImage, object: &DynamicImage) -> Result<Located> {
        let result = if self.single_scale {
            match_single_scale(scene, object, self.options.blur_kernel)?
        } else {
            match_multi_scale(scene, object, &self.options)?
        };
        Ok(Located {
            confidence: result.score,
            region: Some(result.region),
            transform: None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureMatcher {
    pub options: FeatureOptions,
}

impl Matcher for FeatureMatcher {
    fn name(&self) -> &'static str {
        "feature"
    }

    fn locate(&self, scene: &DynamicImage, object: &DynamicImage) -> Result<Located> {
        let result = match_with_homography(scene, object, &self.options)?;
        let region = result
            .transform
            .and_then(|h| projected_bounds(&h, object.dimensions(), scene.dimensions()));
        Ok(Located {
            confidence: result.inlier_ratio,
            region,
            transform: result.transform,
        })
    }
}

/// Bounding box of the object's corners after projection, clamped to the
/// scene.
fn projected_bounds(h: &Homography, object: (u32, u32), scene: (u32, u32)) -> Option<Region> {
    let (w, ht) = (f64::from(object.0), f64::from(object.1));
    let corners = [(0.0, 0.0), (w, 0.0), (w, ht), (0.0, ht)];
    let mut projected = Vec::with_capacity(4);
    for (x, y) in corners {
        projected.push(h.project(x, y)?);
    }
    let min_x = projected.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let min_y = projected.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_x = projected.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let max_y = projected.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }
    Region::clamped(
        min_x.floor() as i64,
        min_y.floor() as i64,
        (max_x - min_x).ceil() as i64,
        (max_y - min_y).ceil() as i64,
        scene,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn template_matcher_reports_region_and_score() {
        let mut hay = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        let needle = RgbImage::from_fn(8, 8, |x, y| {
            if (x + y) % 3 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([200, 30, 30])
            }
        });
        image::imageops::replace(&mut hay, &needle, 12, 20);

        let matcher = TemplateMatcher {
            options: TemplateOptions {
                blur_kernel: 0,
                ..TemplateOptions::default()
            },
            single_scale: true,
        };
        let located = matcher
            .locate(&DynamicImage::ImageRgb8(hay), &DynamicImage::ImageRgb8(needle))
            .expect("locate");

        assert_eq!(matcher.name(), "template");
        assert!(located.confidence > 0.99);
        assert_eq!(located.region, Region::new(12, 20, 8, 8));
        assert!(located.transform.is_none());
    }

    #[test]
    fn feature_matcher_on_flat_images_is_zero_confidence() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([7, 7, 7])));
        let located = FeatureMatcher::default().locate(&flat, &flat).expect("locate");
        assert_eq!(located.confidence, 0.0);
        assert!(located.region.is_none() && located.transform.is_none());
    }

    #[test]
    fn projected_bounds_follow_translation() {
        let h = Homography([[1.0, 0.0, 5.0], [0.0, 1.0, 7.0], [0.0, 0.0, 1.0]]);
        let region = projected_bounds(&h, (10, 4), (100, 100)).expect("region");
        assert_eq!(region, Region::new(5, 7, 10, 4).unwrap());
    }

    #[test]
    fn matchers_are_usable_as_trait_objects() {
        let matchers: Vec<Box<dyn Matcher>> = vec![
            Box::new(TemplateMatcher::default()),
            Box::new(FeatureMatcher::default()),
        ];
        let names: Vec<_> = matchers.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["template", "feature"]);
    }
}
