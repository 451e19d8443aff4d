//! Matting method definitions.
//!
//! [`MethodRequest`] is what the user asks for on the command line;
//! [`MattingMethod`] is what the resolver settles on for a run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Compositing method active for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MattingMethod {
    /// Alpha taken from an explicit mask image
    Mask,
    /// No matting, opaque full-frame output
    Background,
    /// Key out a flat color that is known to surround the subject
    Chromakey,
    /// Segmentation mask video from the SAM 3 service
    Sam3,
    /// Green-screen video from a background remover, then keyed
    Rmbg,
    /// Robust video matting (separate alpha and foreground videos)
    Rvm,
}

impl MattingMethod {
    pub const ALL: &'static [MattingMethod] = &[
        MattingMethod::Mask,
        MattingMethod::Background,
        MattingMethod::Chromakey,
        MattingMethod::Sam3,
        MattingMethod::Rmbg,
        MattingMethod::Rvm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MattingMethod::Mask => "mask",
            MattingMethod::Background => "background",
            MattingMethod::Chromakey => "chromakey",
            MattingMethod::Sam3 => "sam3",
            MattingMethod::Rmbg => "rmbg",
            MattingMethod::Rvm => "rvm",
        }
    }

    /// Whether the encoded output carries an alpha channel.
    pub fn produces_alpha(&self) -> bool {
        !matches!(self, MattingMethod::Background)
    }

    /// Number of user-visible pipeline steps, generation included.
    pub fn step_count(&self) -> usize {
        match self {
            MattingMethod::Background | MattingMethod::Chromakey => 2,
            MattingMethod::Mask | MattingMethod::Sam3 | MattingMethod::Rmbg => 3,
            MattingMethod::Rvm => 4,
        }
    }
}

impl fmt::Display for MattingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Method requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MethodRequest {
    /// Let the resolver pick from image properties
    #[default]
    Auto,
    Chromakey,
    Sam3,
    Rmbg,
    Rvm,
}

impl MethodRequest {
    /// The method a non-auto request forces, if any.
    pub fn forced(&self) -> Option<MattingMethod> {
        match self {
            MethodRequest::Auto => None,
            MethodRequest::Chromakey => Some(MattingMethod::Chromakey),
            MethodRequest::Sam3 => Some(MattingMethod::Sam3),
            MethodRequest::Rmbg => Some(MattingMethod::Rmbg),
            MethodRequest::Rvm => Some(MattingMethod::Rvm),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodRequest::Auto => "auto",
            MethodRequest::Chromakey => "chromakey",
            MethodRequest::Sam3 => "sam3",
            MethodRequest::Rmbg => "rmbg",
            MethodRequest::Rvm => "rvm",
        }
    }
}

impl fmt::Display for MethodRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MethodRequest {
    type Err = MethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(MethodRequest::Auto),
            "chromakey" => Ok(MethodRequest::Chromakey),
            "sam3" => Ok(MethodRequest::Sam3),
            // Aliases accepted by the --matting flag
            "rmbg" | "universal" => Ok(MethodRequest::Rmbg),
            "rvm" | "human" => Ok(MethodRequest::Rvm),
            _ => Err(MethodParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown transparency method: {0}")]
pub struct MethodParseError(String);
