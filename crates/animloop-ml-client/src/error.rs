//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("REPLICATE_API_TOKEN is not set")]
    MissingToken,

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Prediction {id} {status}: {}", .error.as_deref().unwrap_or("no error reported"))]
    PredictionFailed {
        id: String,
        status: String,
        error: Option<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl MlError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Error text reported by the remote service, if any.
    pub fn remote_detail(&self) -> Option<&str> {
        match self {
            MlError::RequestFailed { body, .. } if !body.is_empty() => Some(body.as_str()),
            MlError::PredictionFailed { error: Some(error), .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_failed_display() {
        let err = MlError::PredictionFailed {
            id: "abc".to_string(),
            status: "failed".to_string(),
            error: Some("NSFW content detected".to_string()),
        };
        assert_eq!(err.to_string(), "Prediction abc failed: NSFW content detected");
        assert_eq!(err.remote_detail(), Some("NSFW content detected"));

        let canceled = MlError::PredictionFailed {
            id: "abc".to_string(),
            status: "canceled".to_string(),
            error: None,
        };
        assert_eq!(canceled.to_string(), "Prediction abc canceled: no error reported");
        assert_eq!(canceled.remote_detail(), None);
    }
}
