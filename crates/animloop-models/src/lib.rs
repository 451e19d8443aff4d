//! Shared data models for the animloop pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Asset kinds and matting methods
//! - Key colors
//! - Video generation requests
//! - Encoding parameter sets

pub mod asset;
pub mod color;
pub mod encoding;
pub mod generation;
pub mod method;

// Re-export common types
pub use asset::AssetKind;
pub use color::{KeyColor, KeyColorSource, Rgb};
pub use encoding::EncodingConfig;
pub use generation::{GenerationAspect, GenerationRequest, VideoModel};
pub use method::{MattingMethod, MethodRequest};
