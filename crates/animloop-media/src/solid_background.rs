//! Solid background detection from border pixels.

use std::collections::HashMap;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use animloop_models::{KeyColor, Rgb};

/// Default Euclidean RGB tolerance for "same color as the background".
pub const DEFAULT_TOLERANCE: f64 = 30.0;
/// Default fraction of border pixels that must match the dominant color.
pub const DEFAULT_MIN_COVERAGE: f64 = 0.65;

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolidBackgroundConfig {
    pub tolerance: f64,
    pub min_coverage: f64,
}

impl Default for SolidBackgroundConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            min_coverage: DEFAULT_MIN_COVERAGE,
        }
    }
}

/// A detected flat background.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidBackground {
    pub key: KeyColor,
    /// Fraction of border pixels within tolerance of `key`
    pub coverage: f64,
}

/// Border pixels in a fixed order: top row, bottom row, then the left and
/// right columns without their corners. Each pixel appears once.
pub fn border_pixels(image: &RgbImage) -> Vec<Rgb> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let at = |x: u32, y: u32| Rgb::from(image.get_pixel(x, y).0);
    let mut pixels = Vec::with_capacity((2 * width + 2 * height) as usize);

    pixels.extend((0..width).map(|x| at(x, 0)));
    if height > 1 {
        pixels.extend((0..width).map(|x| at(x, height - 1)));
    }
    for y in 1..height.saturating_sub(1) {
        pixels.push(at(0, y));
        if width > 1 {
            pixels.push(at(width - 1, y));
        }
    }

    pixels
}

/// Most frequent exact color; ties go to the first one seen.
fn dominant_color(pixels: &[Rgb]) -> Option<Rgb> {
    let mut counts: HashMap<Rgb, usize> = HashMap::new();
    for p in pixels {
        *counts.entry(*p).or_default() += 1;
    }

    let mut best: Option<(Rgb, usize)> = None;
    for p in pixels {
        let count = counts[p];
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((*p, count)),
        }
    }
    best.map(|(rgb, _)| rgb)
}

/// Detect a flat background usable directly as a key color.
pub fn detect_solid_background(image: &RgbImage, config: &SolidBackgroundConfig) -> Option<SolidBackground> {
    let border = border_pixels(image);
    let dominant = dominant_color(&border)?;

    let tolerance_sq = config.tolerance * config.tolerance;
    let matching = border
        .iter()
        .filter(|p| (p.distance_sq(&dominant) as f64) <= tolerance_sq)
        .count();
    let coverage = matching as f64 / border.len() as f64;

    debug!(
        dominant = %dominant,
        coverage,
        min_coverage = config.min_coverage,
        border_pixels = border.len(),
        "Border color analysis"
    );

    (coverage >= config.min_coverage).then(|| SolidBackground {
        key: KeyColor::detected(dominant),
        coverage,
    })
}
