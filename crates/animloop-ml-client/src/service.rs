//! Generation and matting collaborator.

use std::path::Path;

use async_trait::async_trait;

use animloop_models::GenerationRequest;

use crate::error::MlResult;
use crate::types::MatteOutput;

/// Remote video generation, segmentation and matting.
///
/// Every call blocks until the remote job finishes and returns the URL of
/// the produced video.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Animate `request.image`.
    async fn generate_video(&self, request: &GenerationRequest) -> MlResult<String>;

    /// Per-frame mask video of `subject`.
    async fn segment_video(&self, video: &Path, subject: &str) -> MlResult<String>;

    /// Same video with the background replaced by pure green.
    async fn remove_background(&self, video: &Path) -> MlResult<String>;

    /// Alpha matte or foreground video.
    async fn matte_video(&self, video: &Path, output: MatteOutput) -> MlResult<String>;

    /// Stream `url` to `dest`, returning bytes written.
    async fn download(&self, url: &str, dest: &Path) -> MlResult<u64>;
}
