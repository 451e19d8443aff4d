//! Synthetic key color selection.
//!
//! Picks the palette color whose nearest foreground color is farthest away
//! (maximin), so keying it out is least likely to eat into the subject.

use std::collections::HashSet;

use image::RgbaImage;
use tracing::debug;

use animloop_models::{KeyColor, Rgb};

/// Pixels with alpha above this are foreground.
pub const OCCUPIED_ALPHA_THRESHOLD: u8 = 128;

/// Candidate key colors, in tie-break order.
pub const KEY_PALETTE: [Rgb; 5] = [
    Rgb::new(0, 255, 255),   // cyan
    Rgb::new(255, 0, 255),   // magenta
    Rgb::new(0, 0, 255),     // blue
    Rgb::new(255, 0, 0),     // red
    Rgb::new(255, 105, 180), // hot pink
];

/// Returned when nothing in the image is opaque enough to avoid.
pub const FALLBACK_KEY: Rgb = KEY_PALETTE[0];

/// Distinct RGB colors of every pixel with alpha above the threshold.
pub fn occupied_colors(image: &RgbaImage) -> HashSet<Rgb> {
    image
        .pixels()
        .filter(|p| p[3] > OCCUPIED_ALPHA_THRESHOLD)
        .map(|p| Rgb::new(p[0], p[1], p[2]))
        .collect()
}

/// Select a key color for `image` from [`KEY_PALETTE`].
pub fn select_key_color(image: &RgbaImage) -> KeyColor {
    let occupied = occupied_colors(image);
    let rgb = select_from_candidates(&KEY_PALETTE, &occupied).unwrap_or(FALLBACK_KEY);
    KeyColor::synthesized(rgb)
}

/// Maximin search over `candidates`; ties keep the earlier candidate.
///
/// Returns `None` when there is nothing to avoid or no candidate.
pub fn select_from_candidates(candidates: &[Rgb], occupied: &HashSet<Rgb>) -> Option<Rgb> {
    if occupied.is_empty() {
        return None;
    }

    let mut best: Option<(Rgb, u32)> = None;
    for candidate in candidates {
        let nearest = occupied
            .iter()
            .map(|c| candidate.distance_sq(c))
            .min()
            .unwrap_or(u32::MAX);

        debug!(
            candidate = %candidate,
            min_distance = (nearest as f64).sqrt(),
            "Key color candidate"
        );

        match best {
            Some((_, best_distance)) if nearest <= best_distance => {}
            _ => best = Some((*candidate, nearest)),
        }
    }

    best.map(|(rgb, _)| rgb)
}
