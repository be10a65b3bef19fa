//! Oriented FAST keypoints with rotated BRIEF descriptors, ratio-test
//! matching and RANSAC homography fitting.

use image::{imageops::FilterType, DynamicImage, GrayImage};
use tracing::debug;

use super::homography::find_homography;
use crate::config::FeatureOptions;
use crate::preprocess::{
    brief_pattern, ensure_initialized, gaussian_blur, to_gray, validate, Plane,
};
use crate::types::HomographyResult;
use crate::Result;

const FAST_THRESHOLD: i16 = 20;
const FAST_ARC: usize = 9;
const HARRIS_K: f32 = 0.04;
const HARRIS_HALF_BLOCK: i32 = 3;
/// Keypoints closer than this to the border cannot host a full rotated patch.
const EDGE: u32 = 19;
const ORIENTATION_RADIUS: i32 = 15;
const PYRAMID_LEVELS: usize = 8;
const PYRAMID_SCALE: f64 = 1.2;

const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Position in full-resolution pixel coordinates
    pub x: f64,
    pub y: f64,
    pub level: usize,
    /// Patch orientation in radians
    pub angle: f64,
    pub response: f32,
}

/// 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u64; 4]);

impl Descriptor {
    pub fn distance(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Locate `object` inside `scene` with a homography.
///
/// Images without usable structure and too few ratio-test survivors are a
/// valid zero-confidence result, not an error.
pub fn match_with_homography(
    scene: &DynamicImage,
    object: &DynamicImage,
    options: &FeatureOptions,
) -> Result<HomographyResult> {
    ensure_initialized();
    validate(scene, "scene")?;
    validate(object, "object")?;

    let scene_features = extract(scene, options.max_features);
    let object_features = extract(object, options.max_features);
    debug!(
        scene = scene_features.len(),
        object = object_features.len(),
        "extracted keypoints"
    );
    if scene_features.is_empty() || object_features.is_empty() {
        return Ok(HomographyResult::none(0));
    }

    let matches = ratio_matches(&object_features, &scene_features, options.ratio);
    if matches.len() < options.min_correspondences {
        debug!(
            correspondences = matches.len(),
            required = options.min_correspondences,
            "too few correspondences for a homography"
        );
        return Ok(HomographyResult::none(matches.len()));
    }

    let (src, dst): (Vec<_>, Vec<_>) = matches
        .iter()
        .map(|&(o, s)| {
            let ok = object_features.keypoints[o];
            let sk = scene_features.keypoints[s];
            ((ok.x, ok.y), (sk.x, sk.y))
        })
        .unzip();

    let Some(fit) = find_homography(&src, &dst, options.reprojection_threshold) else {
        debug!(correspondences = matches.len(), "ransac found no model");
        return Ok(HomographyResult::none(matches.len()));
    };
    let inliers = fit.inlier_count();
    Ok(HomographyResult {
        inlier_ratio: inliers as f64 / matches.len() as f64,
        transform: Some(fit.transform),
        correspondences: matches.len(),
        inliers,
    })
}

/// For each query descriptor, its nearest train descriptor when that match
/// passes the ratio test. Returns `(query_index, train_index)` pairs.
pub fn ratio_matches(query: &Features, train: &Features, ratio: f32) -> Vec<(usize, usize)> {
    if train.len() < 2 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (qi, q) in query.descriptors.iter().enumerate() {
        let mut best = (u32::MAX, 0usize);
        let mut second = u32::MAX;
        for (ti, t) in train.descriptors.iter().enumerate() {
            let d = q.distance(t);
            if d < best.0 {
                second = best.0;
                best = (d, ti);
            } else if d < second {
                second = d;
            }
        }
        if (best.0 as f32) < ratio * second as f32 {
            out.push((qi, best.1));
        }
    }
    out
}

/// Detect up to `max_features` oriented keypoints across an image pyramid and
/// describe each one.
pub fn extract(image: &DynamicImage, max_features: usize) -> Features {
    let base = to_gray(image);
    let min_side = 2 * EDGE + 8;

    let mut candidates: Vec<(Keypoint, usize)> = Vec::new();
    let mut levels: Vec<(GrayImage, Plane)> = Vec::new();
    for level in 0..PYRAMID_LEVELS {
        let scale = PYRAMID_SCALE.powi(level as i32);
        let w = (f64::from(base.width()) / scale).round() as u32;
        let h = (f64::from(base.height()) / scale).round() as u32;
        if w < min_side || h < min_side {
            break;
        }
        let gray = if level == 0 {
            base.clone()
        } else {
            image::imageops::resize(&base, w, h, FilterType::Triangle)
        };

        for (x, y, response) in detect_corners(&gray) {
            let angle = orientation(&gray, x, y);
            candidates.push((
                Keypoint {
                    x: f64::from(x) * scale,
                    y: f64::from(y) * scale,
                    level,
                    angle,
                    response,
                },
                levels.len(),
            ));
        }
        let smoothed = gaussian_blur(&Plane::from_gray(&gray), 7, 2.0);
        levels.push((gray, smoothed));
    }

    candidates.sort_by(|a, b| b.0.response.total_cmp(&a.0.response));
    candidates.truncate(max_features);

    let mut features = Features::default();
    for (kp, level_idx) in candidates {
        let scale = PYRAMID_SCALE.powi(kp.level as i32);
        let lx = (kp.x / scale).round() as i32;
        let ly = (kp.y / scale).round() as i32;
        let descriptor = describe(&levels[level_idx].1, lx, ly, kp.angle);
        features.keypoints.push(kp);
        features.descriptors.push(descriptor);
    }
    features
}

/// FAST-9 corners scored by Harris response, after 3x3 non-maximum
/// suppression. Returns `(x, y, response)` in level coordinates.
fn detect_corners(gray: &GrayImage) -> Vec<(u32, u32, f32)> {
    let (w, h) = gray.dimensions();
    if w <= 2 * EDGE || h <= 2 * EDGE {
        return Vec::new();
    }
    let mut response = vec![f32::NEG_INFINITY; (w * h) as usize];
    for y in EDGE..h - EDGE {
        for x in EDGE..w - EDGE {
            if is_fast_corner(gray, x, y) {
                response[(y * w + x) as usize] = harris_response(gray, x, y);
            }
        }
    }

    let mut corners = Vec::new();
    for y in EDGE..h - EDGE {
        for x in EDGE..w - EDGE {
            let idx = (y * w + x) as usize;
            let r = response[idx];
            if r == f32::NEG_INFINITY {
                continue;
            }
            let mut is_max = true;
            'nbr: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let n = ((y as i32 + dy) as u32 * w + (x as i32 + dx) as u32) as usize;
                    // Equal responses: the earlier pixel in raster order wins.
                    if response[n] > r || (response[n] == r && n < idx) {
                        is_max = false;
                        break 'nbr;
                    }
                }
            }
            if is_max {
                corners.push((x, y, r));
            }
        }
    }
    corners
}

fn is_fast_corner(gray: &GrayImage, x: u32, y: u32) -> bool {
    let p = i16::from(gray.get_pixel(x, y).0[0]);
    let mut states = [0i8; 16];
    for (i, (dx, dy)) in CIRCLE.iter().enumerate() {
        let v = i16::from(gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32).0[0]);
        states[i] = if v > p + FAST_THRESHOLD {
            1
        } else if v < p - FAST_THRESHOLD {
            -1
        } else {
            0
        };
    }
    for target in [1i8, -1] {
        let mut run = 0;
        for i in 0..32 {
            if states[i % 16] == target {
                run += 1;
                if run >= FAST_ARC {
                    return true;
                }
            } else {
                run = 0;
            }
        }
    }
    false
}

fn harris_response(gray: &GrayImage, x: u32, y: u32) -> f32 {
    let at = |px: i32, py: i32| f32::from(gray.get_pixel(px as u32, py as u32).0[0]);
    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
    for dy in -HARRIS_HALF_BLOCK..=HARRIS_HALF_BLOCK {
        for dx in -HARRIS_HALF_BLOCK..=HARRIS_HALF_BLOCK {
            let (px, py) = (x as i32 + dx, y as i32 + dy);
            let ix = (at(px + 1, py - 1) + 2.0 * at(px + 1, py) + at(px + 1, py + 1))
                - (at(px - 1, py - 1) + 2.0 * at(px - 1, py) + at(px - 1, py + 1));
            let iy = (at(px - 1, py + 1) + 2.0 * at(px, py + 1) + at(px + 1, py + 1))
                - (at(px - 1, py - 1) + 2.0 * at(px, py - 1) + at(px + 1, py - 1));
            a += ix * ix;
            b += iy * iy;
            c += ix * iy;
        }
    }
    // Scale down to keep the products inside f32 precision.
    let norm = 1.0 / (4.0 * 255.0 * 49.0);
    let (a, b, c) = (a * norm, b * norm, c * norm);
    a * b - c * c - HARRIS_K * (a + b) * (a + b)
}

/// Intensity-centroid orientation over a circular patch.
fn orientation(gray: &GrayImage, x: u32, y: u32) -> f64 {
    let (mut m01, mut m10) = (0.0f64, 0.0f64);
    let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = f64::from(
                gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)
                    .0[0],
            );
            m10 += f64::from(dx) * v;
            m01 += f64::from(dy) * v;
        }
    }
    m01.atan2(m10)
}

fn describe(smoothed: &Plane, x: i32, y: i32, angle: f64) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let max_x = smoothed.width() as i32 - 1;
    let max_y = smoothed.height() as i32 - 1;
    let sample = |(px, py): (i32, i32)| {
        let (px, py) = (f64::from(px), f64::from(py));
        let rx = (cos * px - sin * py).round() as i32;
        let ry = (sin * px + cos * py).round() as i32;
        smoothed.get(
            (x + rx).clamp(0, max_x) as usize,
            (y + ry).clamp(0, max_y) as usize,
        )
    };

    let mut bits = [0u64; 4];
    for (i, pair) in brief_pattern().iter().enumerate() {
        if sample(pair.a) < sample(pair.b) {
            bits[i / 64] |= 1 << (i % 64);
        }
    }
    Descriptor(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blocks(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = width.div_ceil(8);
        let rows = height.div_ceil(8);
        let shades: Vec<u8> = (0..cols * rows).map(|_| rng.gen()).collect();
        RgbImage::from_fn(width, height, |x, y| {
            let v = shades[((y / 8) * cols + x / 8) as usize];
            Rgb([v, v, v])
        })
    }

    #[test]
    fn descriptor_distance_counts_differing_bits() {
        let a = Descriptor([0, 0, 0, 0]);
        let b = Descriptor([0b1011, 0, u64::MAX, 0]);
        assert_eq!(a.distance(&b), 67);
        assert_eq!(b.distance(&b), 0);
    }

    #[test]
    fn fast_rejects_flat_and_accepts_isolated_dot() {
        let mut img = GrayImage::from_pixel(9, 9, image::Luma([100]));
        assert!(!is_fast_corner(&img, 4, 4));
        img.put_pixel(4, 4, image::Luma([200]));
        assert!(is_fast_corner(&img, 4, 4));
    }

    #[test]
    fn flat_images_have_no_features() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 120, Rgb([80, 80, 80])));
        assert!(extract(&flat, 1000).is_empty());

        let result = match_with_homography(&flat, &flat, &FeatureOptions::default())
            .expect("no structure is not an error");
        assert_eq!(result.inlier_ratio, 0.0);
        assert!(result.transform.is_none());
    }

    #[test]
    fn extract_respects_max_features() {
        let img = DynamicImage::ImageRgb8(blocks(160, 160, 11));
        let features = extract(&img, 25);
        assert!(features.len() <= 25);
        assert_eq!(features.keypoints.len(), features.descriptors.len());
    }

    #[test]
    fn ratio_matches_needs_two_train_descriptors() {
        let one = Features {
            keypoints: vec![Keypoint {
                x: 0.0,
                y: 0.0,
                level: 0,
                angle: 0.0,
                response: 1.0,
            }],
            descriptors: vec![Descriptor([1, 2, 3, 4])],
        };
        assert!(ratio_matches(&one, &one, 0.75).is_empty());
    }

    #[test]
    fn locates_cropped_object_in_scene() {
        let scene = blocks(160, 160, 42);
        let object = image::imageops::crop_imm(&scene, 40, 40, 80, 80).to_image();

        let result = match_with_homography(
            &DynamicImage::ImageRgb8(scene),
            &DynamicImage::ImageRgb8(object),
            &FeatureOptions::default(),
        )
        .expect("match");

        assert!(result.found(), "expected a transform: {result:?}");
        assert!(result.correspondences >= 6);
        assert!(result.inlier_ratio > 0.3, "ratio {}", result.inlier_ratio);
        let (x, y) = result
            .transform
            .and_then(|h| h.project(40.0, 40.0))
            .expect("projectable");
        assert!((x - 80.0).abs() < 3.0 && (y - 80.0).abs() < 3.0, "({x}, {y})");
    }
}
