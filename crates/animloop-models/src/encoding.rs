//! Video encoding configuration.
//!
//! The alpha parameter set is consumed by players that special-case the
//! `alpha_mode=1` stream metadata, so its values and order are fixed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// VP9 encoder (the only browser-friendly codec with alpha in WebM)
pub const VP9_CODEC: &str = "libvpx-vp9";
/// H.264 encoder, used for intermediate grayscale mask clips
pub const H264_CODEC: &str = "libx264";
/// Pixel format carrying an alpha plane
pub const ALPHA_PIXEL_FORMAT: &str = "yuva420p";
/// Opaque pixel format
pub const OPAQUE_PIXEL_FORMAT: &str = "yuv420p";

/// Target bitrate for transparent output
pub const ALPHA_BITRATE: &str = "800k";
pub const ALPHA_CRF: u8 = 35;
/// Opaque video tolerates more compression
pub const OPAQUE_BITRATE: &str = "600k";
pub const OPAQUE_CRF: u8 = 36;
/// libvpx-vp9 `-speed`
pub const VP9_SPEED: u8 = 4;

/// Stream metadata flag marking the alpha plane
pub const ALPHA_MODE_METADATA: &str = "alpha_mode=1";

/// Intermediate mask clip length in seconds and frame rate
pub const MASK_CLIP_SECONDS: u32 = 10;
pub const MASK_CLIP_FPS: u32 = 24;

/// Encoder parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libvpx-vp9", "libx264")
    pub codec: String,

    /// Output pixel format
    pub pixel_format: String,

    /// `-auto-alt-ref` (must be 0 for VP9 alpha)
    #[serde(default)]
    pub auto_alt_ref: Option<u8>,

    /// Target bitrate (e.g., "800k")
    #[serde(default)]
    pub bitrate: Option<String>,

    /// Constant Rate Factor
    #[serde(default)]
    pub crf: Option<u8>,

    /// libvpx `-speed`
    #[serde(default)]
    pub speed: Option<u8>,

    /// Row-based multithreading
    #[serde(default)]
    pub row_mt: bool,

    /// Tag the video stream with `alpha_mode=1`
    #[serde(default)]
    pub alpha_metadata: bool,

    /// Drop audio (`-an`)
    #[serde(default)]
    pub strip_audio: bool,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl EncodingConfig {
    /// Transparent VP9 WebM.
    pub fn for_alpha() -> Self {
        Self {
            codec: VP9_CODEC.to_string(),
            pixel_format: ALPHA_PIXEL_FORMAT.to_string(),
            auto_alt_ref: Some(0),
            bitrate: Some(ALPHA_BITRATE.to_string()),
            crf: Some(ALPHA_CRF),
            speed: Some(VP9_SPEED),
            row_mt: true,
            alpha_metadata: true,
            strip_audio: true,
            extra_args: Vec::new(),
        }
    }

    /// Opaque VP9 WebM for full-frame backgrounds.
    pub fn for_opaque() -> Self {
        Self {
            codec: VP9_CODEC.to_string(),
            pixel_format: OPAQUE_PIXEL_FORMAT.to_string(),
            auto_alt_ref: None,
            bitrate: Some(OPAQUE_BITRATE.to_string()),
            crf: Some(OPAQUE_CRF),
            speed: Some(VP9_SPEED),
            row_mt: true,
            alpha_metadata: false,
            strip_audio: true,
            extra_args: Vec::new(),
        }
    }

    /// Grayscale mask clip rendered from a still mask image.
    pub fn for_mask_clip() -> Self {
        Self {
            codec: H264_CODEC.to_string(),
            pixel_format: OPAQUE_PIXEL_FORMAT.to_string(),
            auto_alt_ref: None,
            bitrate: None,
            crf: None,
            speed: None,
            row_mt: false,
            alpha_metadata: false,
            strip_audio: false,
            extra_args: Vec::new(),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.pixel_format == ALPHA_PIXEL_FORMAT
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ];

        if let Some(alt_ref) = self.auto_alt_ref {
            args.extend_from_slice(&["-auto-alt-ref".to_string(), alt_ref.to_string()]);
        }
        if let Some(ref bitrate) = self.bitrate {
            args.extend_from_slice(&["-b:v".to_string(), bitrate.clone()]);
        }
        if let Some(crf) = self.crf {
            args.extend_from_slice(&["-crf".to_string(), crf.to_string()]);
        }
        if let Some(speed) = self.speed {
            args.extend_from_slice(&["-speed".to_string(), speed.to_string()]);
        }
        if self.row_mt {
            args.extend_from_slice(&["-row-mt".to_string(), "1".to_string()]);
        }
        if self.alpha_metadata {
            args.extend_from_slice(&[
                "-metadata:s:v:0".to_string(),
                ALPHA_MODE_METADATA.to_string(),
            ]);
        }
        if self.strip_audio {
            args.push("-an".to_string());
        }

        args.extend(self.extra_args.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_args_exact() {
        let args = EncodingConfig::for_alpha().to_ffmpeg_args();
        assert_eq!(
            args.join(" "),
            "-c:v libvpx-vp9 -pix_fmt yuva420p -auto-alt-ref 0 -b:v 800k -crf 35 \
             -speed 4 -row-mt 1 -metadata:s:v:0 alpha_mode=1 -an"
        );
    }

    #[test]
    fn test_opaque_args_exact() {
        let args = EncodingConfig::for_opaque().to_ffmpeg_args();
        assert_eq!(
            args.join(" "),
            "-c:v libvpx-vp9 -pix_fmt yuv420p -b:v 600k -crf 36 -speed 4 -row-mt 1 -an"
        );
    }

    #[test]
    fn test_mask_clip_args() {
        let config = EncodingConfig::for_mask_clip();
        assert_eq!(config.to_ffmpeg_args().join(" "), "-c:v libx264 -pix_fmt yuv420p");
        assert!(!config.has_alpha());
        assert!(EncodingConfig::for_alpha().has_alpha());
    }
}
