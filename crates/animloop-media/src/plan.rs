//! Pure run planning.
//!
//! Composes inspection, geometry, method resolution, key selection and the
//! filter graphs into a [`RunPlan`] without touching disk or network.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use animloop_models::{AssetKind, KeyColor, MattingMethod, MethodRequest};

use crate::bake::PreparedMask;
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_encode_plan, EncodePlan};
use crate::geometry::GeometryPlan;
use crate::image_info::ImageDescriptor;
use crate::key_color::select_key_color;
use crate::resolver::{resolve_method, KeyStrategy, ResolveInputs, Resolution};
use crate::solid_background::{detect_solid_background, SolidBackgroundConfig};

/// Caller choices that shape a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanRequest {
    pub asset: AssetKind,
    pub requested: MethodRequest,
    pub solid_background: SolidBackgroundConfig,
}

/// Degenerate inputs that do not stop a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanWarning {
    /// RGBA source whose alpha is uniform; treated as opaque
    FlatSourceAlpha,
    /// Mask whose alpha is uniform
    FlatMaskAlpha,
    /// Chromakey forced on an opaque image with no flat background
    KeyMayBeAbsent,
}

/// Everything decided before the first external call.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub descriptor: ImageDescriptor,
    pub geometry: GeometryPlan,
    pub resolution: Resolution,
    pub key_color: Option<KeyColor>,
    /// Composite the source onto the key color before generation
    pub bake_source: bool,
    pub mask_dims: Option<(u32, u32)>,
    pub encode: EncodePlan,
    pub warnings: Vec<PlanWarning>,
}

impl RunPlan {
    pub fn method(&self) -> MattingMethod {
        self.resolution.method
    }
}

/// Plan a run for `source` and an optional prepared mask.
pub fn plan_run(request: &PlanRequest, source: &DynamicImage, mask: Option<&PreparedMask>) -> MediaResult<RunPlan> {
    let descriptor = ImageDescriptor::describe(source);
    if descriptor.width == 0 || descriptor.height == 0 {
        return Err(MediaError::invalid_image("source image has zero width or height"));
    }

    let mut warnings = Vec::new();
    if descriptor.has_flat_alpha() {
        warnings.push(PlanWarning::FlatSourceAlpha);
    }
    if mask.is_some_and(|m| m.flat_alpha) {
        warnings.push(PlanWarning::FlatMaskAlpha);
    }

    let geometry = GeometryPlan::for_source(descriptor.width, descriptor.height);

    let inputs = ResolveInputs {
        asset: request.asset,
        has_mask: mask.is_some(),
        requested: request.requested,
        has_transparency: descriptor.has_real_transparency(),
    };
    let resolution = resolve_method(&inputs, || {
        detect_solid_background(&source.to_rgb8(), &request.solid_background)
    });

    let (key_color, bake_source) = match &resolution.key {
        None => (None, false),
        Some(KeyStrategy::Detected(key)) => (Some(key.clone()), false),
        Some(KeyStrategy::Synthesize { bake }) => {
            if !bake {
                warnings.push(PlanWarning::KeyMayBeAbsent);
            }
            (Some(select_key_color(&source.to_rgba8())), *bake)
        }
    };

    let mask_dims = mask.map(PreparedMask::dimensions);
    let encode = build_encode_plan(&geometry, resolution.method, key_color.as_ref(), mask_dims)?;

    info!(
        method = %resolution.method,
        reason = ?resolution.reason,
        width = descriptor.width,
        height = descriptor.height,
        crop_width = geometry.crop_width,
        crop_height = geometry.crop_height,
        key = key_color.as_ref().map(|k| k.hex()).unwrap_or("-"),
        bake = bake_source,
        warnings = warnings.len(),
        "Planned run"
    );

    Ok(RunPlan {
        descriptor,
        geometry,
        resolution,
        key_color,
        bake_source,
        mask_dims,
        encode,
        warnings,
    })
}
