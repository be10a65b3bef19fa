//! WCAG 2.x relative luminance and contrast ratio.

use std::str::FromStr;

use palette::Srgb;

use crate::error::VraError;
use crate::Result;

/// Contrast ratio between two colours, in [1, 21]. Symmetric in its inputs.
pub fn wcag_contrast_ratio(fg: Srgb<u8>, bg: Srgb<u8>) -> f64 {
    let l1 = relative_luminance(fg);
    let l2 = relative_luminance(bg);
    (l1.max(l2) + 0.05) / (l1.min(l2) + 0.05)
}

pub fn relative_luminance(color: Srgb<u8>) -> f64 {
    0.2126 * linearize(color.red) + 0.7152 * linearize(color.green) + 0.0722 * linearize(color.blue)
}

fn linearize(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Parse `#RRGGBB` / `RRGGBB` (or the 3-digit short form).
pub fn parse_hex_color(value: &str) -> Result<Srgb<u8>> {
    let trimmed = value.trim();
    let hex = trimmed.trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 3) {
        return Err(VraError::Config(format!("Invalid color '{}'", value)));
    }
    Srgb::<u8>::from_str(hex).map_err(|e| VraError::Config(format!("Invalid color '{}': {}", value, e)))
}

pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}
