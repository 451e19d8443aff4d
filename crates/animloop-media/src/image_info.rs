//! Source image description and alpha inspection.

use image::{DynamicImage, GenericImageView, RgbaImage};
use serde::{Deserialize, Serialize};

/// Channel layout relevant to matting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Rgb,
    Rgba,
}

/// Read-only facts about a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub mode: ColorMode,
    /// (min, max) alpha over all pixels, present for RGBA images only
    pub alpha_range: Option<(u8, u8)>,
}

impl ImageDescriptor {
    /// Describe a decoded image. Any color type with an alpha channel counts
    /// as RGBA; 16-bit alpha is reduced to 8 bits first.
    pub fn describe(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            Self {
                width,
                height,
                mode: ColorMode::Rgba,
                alpha_range: alpha_range(&rgba),
            }
        } else {
            Self {
                width,
                height,
                mode: ColorMode::Rgb,
                alpha_range: None,
            }
        }
    }

    /// Whether the alpha channel carries cutout information.
    ///
    /// A flat channel, even a fully transparent one, does not.
    pub fn has_real_transparency(&self) -> bool {
        matches!(self.alpha_range, Some((min, max)) if min != max)
    }

    /// RGBA image whose alpha is the same everywhere.
    pub fn has_flat_alpha(&self) -> bool {
        matches!(self.alpha_range, Some((min, max)) if min == max)
    }
}

/// Min and max alpha over all pixels; `None` for an empty image.
pub fn alpha_range(image: &RgbaImage) -> Option<(u8, u8)> {
    image.pixels().fold(None, |range, p| {
        let a = p[3];
        Some(match range {
            None => (a, a),
            Some((min, max)) => (min.min(a), max.max(a)),
        })
    })
}

/// Whether an RGBA image has non-flat alpha.
pub fn has_real_transparency(image: &RgbaImage) -> bool {
    matches!(alpha_range(image), Some((min, max)) if min != max)
}
