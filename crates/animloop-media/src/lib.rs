//! Image analysis and FFmpeg encoding for animloop.
//!
//! This crate provides:
//! - Output geometry planning and alpha inspection
//! - Key color selection and solid background detection
//! - Matting method resolution
//! - Filter graph and encode step construction per method
//! - Type-safe FFmpeg command building and a process runner
//! - Progress parsing from `-progress pipe:2`

pub mod bake;
pub mod command;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod image_info;
pub mod key_color;
pub mod plan;
pub mod progress;
pub mod resolver;
pub mod solid_background;

pub use bake::{bake_onto_key, prepare_mask, write_baked_source, PreparedMask};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner, MediaEncoder};
pub use error::{MediaError, MediaResult};
pub use filters::{build_encode_plan, Artifact, Destination, EncodePlan, EncodeStep, FilterGraph, StepTimeout};
pub use geometry::GeometryPlan;
pub use image_info::{has_real_transparency, ColorMode, ImageDescriptor};
pub use key_color::{select_key_color, KEY_PALETTE};
pub use plan::{plan_run, PlanRequest, PlanWarning, RunPlan};
pub use progress::FfmpegProgress;
pub use resolver::{resolve_method, KeyStrategy, Resolution, ResolveInputs, ResolveReason};
pub use solid_background::{detect_solid_background, SolidBackground, SolidBackgroundConfig};
