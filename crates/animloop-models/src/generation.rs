//! Video generation request types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Image-to-video backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoModel {
    #[default]
    Kling,
    Minimax,
}

impl VideoModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoModel::Kling => "kling",
            VideoModel::Minimax => "minimax",
        }
    }

    /// Replicate model reference.
    pub fn model_ref(&self) -> &'static str {
        match self {
            VideoModel::Kling => "kwaivgi/kling-v2.1",
            VideoModel::Minimax => "minimax/video-01",
        }
    }

    /// Whether the backend accepts an end frame (used for seamless loops).
    pub fn supports_end_frame(&self) -> bool {
        matches!(self, VideoModel::Kling)
    }
}

impl fmt::Display for VideoModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoModel {
    type Err = VideoModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kling" => Ok(VideoModel::Kling),
            "minimax" => Ok(VideoModel::Minimax),
            _ => Err(VideoModelParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown video model: {0}")]
pub struct VideoModelParseError(String);

/// Aspect ratio passed to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum GenerationAspect {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl GenerationAspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationAspect::Landscape => "16:9",
            GenerationAspect::Portrait => "9:16",
            GenerationAspect::Square => "1:1",
        }
    }

    fn ratio(&self) -> f64 {
        match self {
            GenerationAspect::Landscape => 16.0 / 9.0,
            GenerationAspect::Portrait => 9.0 / 16.0,
            GenerationAspect::Square => 1.0,
        }
    }

    /// Closest supported aspect for the given frame size (log-ratio distance).
    pub fn nearest(width: u32, height: u32) -> Self {
        let target = (width.max(1) as f64 / height.max(1) as f64).ln();
        [
            GenerationAspect::Landscape,
            GenerationAspect::Portrait,
            GenerationAspect::Square,
        ]
        .into_iter()
        .min_by(|a, b| {
            let da = (a.ratio().ln() - target).abs();
            let db = (b.ratio().ln() - target).abs();
            da.total_cmp(&db)
        })
        .unwrap_or_default()
    }
}

impl fmt::Display for GenerationAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request to animate a still image.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    pub model: VideoModel,
    /// Image to animate (possibly baked onto a key color)
    pub image: PathBuf,
    pub prompt: String,
    /// Clip length in seconds
    pub duration_secs: u32,
    pub aspect: GenerationAspect,
    /// Use the start image as end image for a seamless loop
    #[serde(default)]
    pub loop_video: bool,
}
