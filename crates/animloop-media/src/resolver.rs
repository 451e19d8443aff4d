//! Matting method resolution.
//!
//! Rules are evaluated once, in order, and the first match wins:
//!
//! 1. explicit mask image -> `mask`
//! 2. background asset -> `background`
//! 3. forced method -> that method
//! 4. real transparency -> `chromakey` with a synthesized key (baked)
//! 5. flat border color -> `chromakey` with the detected key
//! 6. anything else -> `sam3`

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use animloop_models::{AssetKind, KeyColor, MattingMethod, MethodRequest};

use crate::solid_background::SolidBackground;

/// Facts the resolver decides from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveInputs {
    pub asset: AssetKind,
    pub has_mask: bool,
    pub requested: MethodRequest,
    pub has_transparency: bool,
}

/// How the chroma-key branch obtains its key color.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyStrategy {
    /// Pick a palette color against the image; `bake` composites the
    /// source onto it before generation.
    Synthesize { bake: bool },
    /// Use a flat background that is already in the image.
    Detected(KeyColor),
}

/// Outcome of method resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub method: MattingMethod,
    /// Present only for `chromakey`
    pub key: Option<KeyStrategy>,
    /// Which rule decided
    pub reason: ResolveReason,
}

/// Rule that produced a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveReason {
    ExplicitMask,
    BackgroundAsset,
    Forced,
    ExistingAlpha,
    SolidBackground,
    SegmentationFallback,
}

impl Resolution {
    fn plain(method: MattingMethod, reason: ResolveReason) -> Self {
        Self {
            method,
            key: None,
            reason,
        }
    }

    pub fn bakes_source(&self) -> bool {
        matches!(self.key, Some(KeyStrategy::Synthesize { bake: true }))
    }
}

/// Resolve the matting method for a run.
///
/// `detect_solid` runs at most once, and only when the earlier rules leave
/// the decision open.
pub fn resolve_method<F>(inputs: &ResolveInputs, detect_solid: F) -> Resolution
where
    F: FnOnce() -> Option<SolidBackground>,
{
    let resolution = resolve_inner(inputs, detect_solid);
    debug!(
        method = %resolution.method,
        reason = ?resolution.reason,
        asset = %inputs.asset,
        requested = %inputs.requested,
        has_mask = inputs.has_mask,
        has_transparency = inputs.has_transparency,
        "Resolved matting method"
    );
    resolution
}

fn resolve_inner<F>(inputs: &ResolveInputs, detect_solid: F) -> Resolution
where
    F: FnOnce() -> Option<SolidBackground>,
{
    // Mask wins over a background asset type
    if inputs.has_mask {
        return Resolution::plain(MattingMethod::Mask, ResolveReason::ExplicitMask);
    }

    if inputs.asset == AssetKind::Background {
        return Resolution::plain(MattingMethod::Background, ResolveReason::BackgroundAsset);
    }

    if let Some(forced) = inputs.requested.forced() {
        if forced != MattingMethod::Chromakey {
            return Resolution::plain(forced, ResolveReason::Forced);
        }
        let key = if inputs.has_transparency {
            KeyStrategy::Synthesize { bake: true }
        } else if let Some(solid) = detect_solid() {
            KeyStrategy::Detected(solid.key)
        } else {
            warn!(
                "Chromakey forced on an opaque image without a flat background; \
                 the key color may not appear in the generated video"
            );
            KeyStrategy::Synthesize { bake: false }
        };
        return Resolution {
            method: MattingMethod::Chromakey,
            key: Some(key),
            reason: ResolveReason::Forced,
        };
    }

    if inputs.has_transparency {
        return Resolution {
            method: MattingMethod::Chromakey,
            key: Some(KeyStrategy::Synthesize { bake: true }),
            reason: ResolveReason::ExistingAlpha,
        };
    }

    if let Some(solid) = detect_solid() {
        return Resolution {
            method: MattingMethod::Chromakey,
            key: Some(KeyStrategy::Detected(solid.key)),
            reason: ResolveReason::SolidBackground,
        };
    }

    Resolution::plain(MattingMethod::Sam3, ResolveReason::SegmentationFallback)
}
