//! Core geometric types used throughout the engine.
//!
//! - [`Point`] - Integer pixel coordinate
//! - [`Region`] - Axis-aligned rectangle inside an image

use serde::{Deserialize, Serialize};

/// A pixel coordinate (column, row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Axis-aligned rectangle in pixel coordinates.
///
/// Width and height are always positive; constructors return `None` rather
/// than produce an empty region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Clamp an arbitrary rectangle into an image of `bounds` size.
    ///
    /// The origin is clamped to the last valid pixel and the extent to
    /// `[1, remaining]`, so any rectangle maps onto at least one pixel.
    /// Returns `None` only when the bounds themselves are empty.
    pub fn clamped(x: i64, y: i64, width: i64, height: i64, bounds: (u32, u32)) -> Option<Self> {
        let (bw, bh) = (i64::from(bounds.0), i64::from(bounds.1));
        if bw == 0 || bh == 0 {
            return None;
        }
        let x = x.clamp(0, bw - 1);
        let y = y.clamp(0, bh - 1);
        let width = width.clamp(1, bw - x);
        let height = height.clamp(1, bh - y);
        Some(Self {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn top_left(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn fits_within(&self, bounds: (u32, u32)) -> bool {
        self.right() <= bounds.0 && self.bottom() <= bounds.1
    }
}
