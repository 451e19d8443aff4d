//! Output geometry planning.
//!
//! The generated video is scaled ~15% past the target and center-cropped
//! back, which absorbs the zoom drift image-to-video models tend to add.

use serde::{Deserialize, Serialize};

use animloop_models::GenerationAspect;

/// Longest edge allowed per axis (mobile ad budget).
pub const MAX_EDGE: u32 = 720;
/// Oversize factor as an integer percentage.
pub const OVERSIZE_PERCENT: u32 = 115;

/// Render and crop dimensions derived from the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryPlan {
    pub capped_width: u32,
    pub capped_height: u32,
    pub oversized_width: u32,
    pub oversized_height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
}

impl GeometryPlan {
    /// Plan geometry for a `width` x `height` source.
    ///
    /// Each axis is capped, oversized and evened on its own; the aspect
    /// ratio is not locked.
    pub fn for_source(width: u32, height: u32) -> Self {
        let capped_width = width.clamp(1, MAX_EDGE);
        let capped_height = height.clamp(1, MAX_EDGE);

        Self {
            capped_width,
            capped_height,
            oversized_width: round_up_even(oversize(capped_width)),
            oversized_height: round_up_even(oversize(capped_height)),
            crop_width: round_up_even(capped_width),
            crop_height: round_up_even(capped_height),
        }
    }

    /// `scale=...:force_original_aspect_ratio=increase,crop=...`
    ///
    /// Scaling with `increase` guarantees the scaled frame covers the crop
    /// box whatever aspect the generator returned.
    pub fn scale_crop_filter(&self) -> String {
        format!(
            "scale={}:{}:force_original_aspect_ratio=increase,crop={}:{}",
            self.oversized_width, self.oversized_height, self.crop_width, self.crop_height
        )
    }

    /// Aspect ratio to request from the generation backend.
    pub fn generation_aspect(&self) -> GenerationAspect {
        GenerationAspect::nearest(self.capped_width, self.capped_height)
    }
}

fn oversize(dim: u32) -> u32 {
    dim * OVERSIZE_PERCENT / 100
}

/// Round up to the next even integer (yuv420 needs even dimensions).
pub fn round_up_even(dim: u32) -> u32 {
    dim + (dim % 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        let plan = GeometryPlan::for_source(1000, 500);
        assert_eq!((plan.capped_width, plan.capped_height), (720, 500));
        assert_eq!((plan.oversized_width, plan.oversized_height), (828, 576));
        assert_eq!((plan.crop_width, plan.crop_height), (720, 500));
    }

    #[test]
    fn test_small_source_still_gets_margin() {
        let plan = GeometryPlan::for_source(301, 200);
        assert_eq!((plan.capped_width, plan.capped_height), (301, 200));
        // 301 * 1.15 = 346.15 -> 346; 200 * 1.15 = 230
        assert_eq!((plan.oversized_width, plan.oversized_height), (346, 230));
        assert_eq!((plan.crop_width, plan.crop_height), (302, 200));
    }

    #[test]
    fn test_invariants_over_range() {
        for w in (1..=1500).step_by(7) {
            for h in [1u32, 2, 3, 99, 500, 719, 720, 721, 4000] {
                let plan = GeometryPlan::for_source(w, h);
                for (over, crop, capped, src) in [
                    (plan.oversized_width, plan.crop_width, plan.capped_width, w),
                    (plan.oversized_height, plan.crop_height, plan.capped_height, h),
                ] {
                    assert_eq!(over % 2, 0, "oversized must be even for {w}x{h}");
                    assert_eq!(crop % 2, 0, "crop must be even for {w}x{h}");
                    assert!(over >= crop, "oversized < crop for {w}x{h}");
                    assert!(crop >= capped);
                    assert_eq!(capped, src.min(MAX_EDGE));
                }
            }
        }
    }

    #[test]
    fn test_scale_crop_filter() {
        let plan = GeometryPlan::for_source(1000, 500);
        assert_eq!(
            plan.scale_crop_filter(),
            "scale=828:576:force_original_aspect_ratio=increase,crop=720:500"
        );
    }

    #[test]
    fn test_generation_aspect() {
        assert_eq!(
            GeometryPlan::for_source(1920, 1080).generation_aspect(),
            GenerationAspect::Square
        );
        assert_eq!(
            GeometryPlan::for_source(1280, 400).generation_aspect(),
            GenerationAspect::Landscape
        );
        assert_eq!(
            GeometryPlan::for_source(400, 1280).generation_aspect(),
            GenerationAspect::Portrait
        );
    }
}
