//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use animloop_media::SolidBackgroundConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent directory for per-run working areas (system temp when unset)
    pub work_dir: Option<PathBuf>,
    /// Timeout for turning a mask image into a clip
    pub mask_timeout: Duration,
    /// Timeout for every final encode
    pub encode_timeout: Duration,
    /// Border analysis thresholds
    pub solid_background: SolidBackgroundConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            mask_timeout: Duration::from_secs(120),
            encode_timeout: Duration::from_secs(600), // 10 minutes
            solid_background: SolidBackgroundConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("ANIMLOOP_WORK_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            mask_timeout: Duration::from_secs(
                std::env::var("ANIMLOOP_MASK_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            encode_timeout: Duration::from_secs(
                std::env::var("ANIMLOOP_ENCODE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            solid_background: SolidBackgroundConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.mask_timeout, Duration::from_secs(120));
        assert_eq!(config.encode_timeout, Duration::from_secs(600));
        assert!(config.work_dir.is_none());
        assert_eq!(config.solid_background.min_coverage, 0.65);
    }
}
