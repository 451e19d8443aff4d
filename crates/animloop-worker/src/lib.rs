//! Animation pipeline worker.
//!
//! This crate provides:
//! - Environment-driven pipeline configuration
//! - The run orchestrator sequencing generation, matting and encoding
//! - Structured run logging
//! - The `animloop` CLI and `animloop-selfcheck` binaries

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, RunLogger};
pub use pipeline::{PipelineOrchestrator, RunOutcome, RunRequest};
