//! Pixel-level preparation of the images handed to generation and encoding.

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use tracing::debug;

use animloop_models::Rgb;

use crate::error::MediaResult;
use crate::image_info::alpha_range;

/// Composite `image` over a solid `key` background.
///
/// Standard "over" blend per channel: `(fg * a + key * (255 - a)) / 255`,
/// rounded to nearest.
pub fn bake_onto_key(image: &RgbaImage, key: Rgb) -> RgbImage {
    let key = [key.r, key.g, key.b];
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let a = p[3] as u32;
        let mut out = [0u8; 3];
        for (c, slot) in out.iter_mut().enumerate() {
            let blended = p[c] as u32 * a + key[c] as u32 * (255 - a);
            *slot = ((blended + 127) / 255) as u8;
        }
        image::Rgb(out)
    })
}

/// Bake `source` onto `key` and write the result as PNG.
pub fn write_baked_source(source: &DynamicImage, key: Rgb, path: &Path) -> MediaResult<()> {
    let baked = bake_onto_key(&source.to_rgba8(), key);
    baked.save_with_format(path, ImageFormat::Png)?;
    debug!(path = %path.display(), key = %key, "Wrote baked source image");
    Ok(())
}

/// Mask image normalized to RGBA.
#[derive(Debug, Clone)]
pub struct PreparedMask {
    pub image: RgbaImage,
    /// Alpha is the same everywhere, so the mask hides or keeps everything
    pub flat_alpha: bool,
}

impl PreparedMask {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Write the normalized mask as PNG.
    pub fn write_png(&self, path: &Path) -> MediaResult<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Convert any mask to RGBA and flag a flat alpha channel.
pub fn prepare_mask(mask: &DynamicImage) -> PreparedMask {
    let converted = !mask.color().has_alpha();
    let image = mask.to_rgba8();
    let flat_alpha = matches!(alpha_range(&image), Some((min, max)) if min == max);

    if converted {
        debug!("Mask has no alpha channel; converted to RGBA");
    }

    PreparedMask { image, flat_alpha }
}
