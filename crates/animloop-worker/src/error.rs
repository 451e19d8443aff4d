//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

use animloop_media::MediaError;
use animloop_ml_client::MlError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("ML service error: {0}")]
    Ml(#[from] MlError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check if the error was raised before any expensive work started.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WorkerError::InputNotFound(_)
                | WorkerError::InvalidInput(_)
                | WorkerError::Media(MediaError::FfmpegNotFound)
                | WorkerError::Ml(MlError::MissingToken)
        )
    }

    /// Diagnostic text from the failing external tool or service.
    pub fn diagnostic_tail(&self) -> Option<&str> {
        match self {
            WorkerError::Media(e) => e.diagnostic_tail(),
            WorkerError::Ml(e) => e.remote_detail(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(WorkerError::InputNotFound(PathBuf::from("x.png")).is_precondition());
        assert!(WorkerError::from(MediaError::FfmpegNotFound).is_precondition());
        assert!(WorkerError::from(MlError::MissingToken).is_precondition());
        assert!(!WorkerError::from(MediaError::Timeout(600)).is_precondition());
    }

    #[test]
    fn test_diagnostic_tail_from_ffmpeg() {
        let err = WorkerError::from(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("Unknown encoder 'libvpx-vp9'".to_string()),
            Some(1),
        ));
        assert_eq!(err.diagnostic_tail(), Some("Unknown encoder 'libvpx-vp9'"));
        assert!(!err.is_precondition());
    }
}
