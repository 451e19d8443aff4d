//! Client for the Replicate predictions API.
//!
//! This crate provides the [`VideoService`] collaborator used by the
//! pipeline: image-to-video generation, promptable segmentation,
//! background removal and video matting, plus artifact download.

pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::{ReplicateClient, ReplicateConfig};
pub use error::{MlError, MlResult};
pub use service::VideoService;
pub use types::{MatteOutput, ModelRef, Prediction, PredictionStatus};
