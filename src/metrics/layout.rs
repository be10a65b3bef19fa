//! Edge-based layout box detection and spacing.

use std::collections::VecDeque;

use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::preprocess::{ensure_initialized, prepare_gray, reflect101, validate};
use crate::types::Region;
use crate::Result;

pub const CANNY_LOW: i32 = 50;
pub const CANNY_HIGH: i32 = 150;
/// Boxes at or below this area are treated as noise.
pub const MIN_BOX_AREA: u64 = 200;

// tan(22.5 deg) and tan(67.5 deg)
const TAN_22_5: f64 = 0.414_213_562_373_095_1;
const TAN_67_5: f64 = 2.414_213_562_373_095;

/// Bounding boxes of the outermost edge contours, in raster order of their
/// first pixel.
pub fn detect_boxes(image: &DynamicImage) -> Result<Vec<Region>> {
    ensure_initialized();
    validate(image, "image")?;

    let gray = prepare_gray(image, 3).to_gray();
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let boxes: Vec<Region> = external_components(&edges)
        .into_iter()
        .filter(|r| r.area() > MIN_BOX_AREA)
        .collect();
    debug!(boxes = boxes.len(), "layout boxes detected");
    Ok(boxes)
}

/// Horizontal gap from the right edge of `a` to the left edge of `b`.
/// Negative when they overlap.
pub fn pixel_distance(a: &Region, b: &Region) -> i64 {
    i64::from(b.x) - (i64::from(a.x) + i64::from(a.width))
}

/// Gaps between horizontally consecutive boxes, ordered by x.
pub fn horizontal_gaps(boxes: &[Region]) -> Vec<i64> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by_key(|r| (r.x, r.y));
    sorted
        .windows(2)
        .map(|pair| pixel_distance(&pair[0], &pair[1]))
        .collect()
}

/// Binary edge map: 255 on edges, 0 elsewhere.
pub fn canny(gray: &GrayImage, low: i32, high: i32) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut out = GrayImage::new(w as u32, h as u32);
    if w < 3 || h < 3 {
        return out;
    }

    let at = |x: isize, y: isize| {
        i32::from(gray.get_pixel(reflect101(x, w) as u32, reflect101(y, h) as u32).0[0])
    };
    let mut gx = vec![0i32; w * h];
    let mut gy = vec![0i32; w * h];
    let mut mag = vec![0i32; w * h];
    for y in 0..h as isize {
        for x in 0..w as isize {
            let dx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let dy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y as usize * w + x as usize;
            gx[i] = dx;
            gy[i] = dy;
            mag[i] = dx.abs() + dy.abs();
        }
    }

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut class = vec![0u8; w * h];
    let mut strong = VecDeque::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if m <= low {
                continue;
            }
            let (ax, ay) = (f64::from(gx[i].abs()), f64::from(gy[i].abs()));
            let is_peak = if ay < TAN_22_5 * ax {
                m > mag[i - 1] && m >= mag[i + 1]
            } else if ay > TAN_67_5 * ax {
                m > mag[i - w] && m >= mag[i + w]
            } else if (gx[i] ^ gy[i]) < 0 {
                m > mag[i - w + 1] && m > mag[i + w - 1]
            } else {
                m > mag[i - w - 1] && m > mag[i + w + 1]
            };
            if !is_peak {
                continue;
            }
            if m > high {
                class[i] = 2;
                strong.push_back(i);
            } else {
                class[i] = 1;
            }
        }
    }

    while let Some(i) = strong.pop_front() {
        out.as_mut()[i] = 255;
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let n = ny * w + nx;
                if class[n] == 1 {
                    class[n] = 2;
                    strong.push_back(n);
                }
            }
        }
    }
    out
}

/// Bounding boxes of 8-connected edge components that are not enclosed by
/// another component.
///
/// Background is 4-connected. A component is external when it touches the
/// image border or background reachable from the border.
pub fn external_components(edges: &GrayImage) -> Vec<Region> {
    let (w, h) = (edges.width() as usize, edges.height() as usize);
    let is_edge = |i: usize| edges.as_raw()[i] != 0;

    let mut outside = vec![false; w * h];
    let mut queue = VecDeque::new();
    for y in 0..h {
        for x in 0..w {
            if (x == 0 || y == 0 || x == w - 1 || y == h - 1) && !is_edge(y * w + x) {
                outside[y * w + x] = true;
                queue.push_back(y * w + x);
            }
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % w, i / w);
        for (nx, ny) in neighbours4(x, y, w, h) {
            let n = ny * w + nx;
            if !outside[n] && !is_edge(n) {
                outside[n] = true;
                queue.push_back(n);
            }
        }
    }

    let mut seen = vec![false; w * h];
    let mut boxes = Vec::new();
    for start in 0..w * h {
        if seen[start] || !is_edge(start) {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0, 0);
        let mut external = false;
        while let Some(i) = queue.pop_front() {
            let (x, y) = (i % w, i / w);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                external = true;
            }
            if !external && neighbours4(x, y, w, h).any(|(nx, ny)| outside[ny * w + nx]) {
                external = true;
            }
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if !seen[n] && is_edge(n) {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }
        if external {
            boxes.push(Region {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            });
        }
    }
    boxes
}

fn neighbours4(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    let candidates = [
        (x.checked_sub(1), Some(y)),
        ((x + 1 < w).then_some(x + 1), Some(y)),
        (Some(x), y.checked_sub(1)),
        (Some(x), (y + 1 < h).then_some(y + 1)),
    ];
    candidates
        .into_iter()
        .filter_map(|(nx, ny)| Some((nx?, ny?)))
}
