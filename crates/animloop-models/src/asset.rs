//! Asset category definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What kind of ad asset the source image represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A single subject that should end up on a transparent background
    #[default]
    Character,
    /// A full-frame scene, encoded opaque with no matting
    Background,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Character => "character",
            AssetKind::Background => "background",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = AssetKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "character" => Ok(AssetKind::Character),
            "background" => Ok(AssetKind::Background),
            _ => Err(AssetKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown asset type: {0}")]
pub struct AssetKindParseError(String);
