//! Replicate HTTP client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info};

use animloop_models::GenerationRequest;

use crate::error::{MlError, MlResult};
use crate::service::VideoService;
use crate::types::{
    background_removal_input, generation_input, matting_input, output_url, segmentation_input, CreatePrediction,
    FileUpload, MatteOutput, ModelRef, Prediction, PredictionStatus, DEFAULT_SAM3_MODEL, RMBG_MODEL, RVM_MODEL,
};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Configuration for the Replicate client.
#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: String,
    /// API root, without trailing slash
    pub base_url: String,
    /// Delay between prediction status checks
    pub poll_interval: Duration,
    /// Upper bound for one prediction, creation to terminal state
    pub prediction_timeout: Duration,
    /// Timeout for API calls (create, poll, upload)
    pub http_timeout: Duration,
    /// Timeout for streaming one output artifact to disk
    pub download_timeout: Duration,
    /// Segmentation model reference
    pub sam3_model: String,
}

impl ReplicateConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
            prediction_timeout: Duration::from_secs(900),
            http_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(1800),
            sam3_model: DEFAULT_SAM3_MODEL.to_string(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> MlResult<Self> {
        let api_token = std::env::var("REPLICATE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(MlError::MissingToken)?;

        let defaults = Self::new(api_token);
        Ok(Self {
            base_url: std::env::var("REPLICATE_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url.clone()),
            poll_interval: std::env::var("REPLICATE_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            prediction_timeout: std::env::var("REPLICATE_PREDICTION_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.prediction_timeout),
            http_timeout: std::env::var("REPLICATE_HTTP_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            download_timeout: std::env::var("REPLICATE_DOWNLOAD_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            sam3_model: std::env::var("ANIMLOOP_SAM3_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.sam3_model.clone()),
            ..defaults
        })
    }
}

/// Client for the Replicate predictions API.
pub struct ReplicateClient {
    http: Client,
    config: ReplicateConfig,
}

impl ReplicateClient {
    /// Create a new client.
    pub fn new(config: ReplicateConfig) -> MlResult<Self> {
        // Whole-request timeouts are set per call; downloads need a longer one
        let http = Client::builder()
            .connect_timeout(config.http_timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(ReplicateConfig::from_env()?)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.api_token)
    }

    /// Run `model` on `input` and return the output URL.
    pub async fn run(&self, model: &str, input: Value) -> MlResult<String> {
        let started = Instant::now();
        let prediction = self.create_prediction(model, input).await?;
        info!(model, prediction_id = %prediction.id, "Prediction created");

        let finished = self.wait_for(prediction).await?;
        let output = finished
            .output
            .as_ref()
            .ok_or_else(|| MlError::invalid_response(format!("prediction {} succeeded without output", finished.id)))?;
        let url = output_url(output)?;

        info!(
            model,
            prediction_id = %finished.id,
            elapsed_secs = started.elapsed().as_secs(),
            "Prediction succeeded"
        );
        Ok(url.to_string())
    }

    /// Start a prediction.
    ///
    /// Versioned references go through `/predictions`; bare `owner/name`
    /// references use the model's own endpoint.
    pub async fn create_prediction(&self, model: &str, input: Value) -> MlResult<Prediction> {
        let model_ref = ModelRef::parse(model)?;
        let (url, body) = match model_ref.version {
            Some(version) => (
                format!("{}/predictions", self.config.base_url),
                CreatePrediction {
                    version: Some(version),
                    input,
                },
            ),
            None => (
                format!(
                    "{}/models/{}/{}/predictions",
                    self.config.base_url, model_ref.owner, model_ref.name
                ),
                CreatePrediction { version: None, input },
            ),
        };

        debug!("Creating prediction at {}", url);
        let response = self
            .http
            .post(&url)
            .timeout(self.config.http_timeout)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(&body)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// Fetch the current state of a prediction from its `urls.get`.
    pub async fn get_prediction(&self, url: &str) -> MlResult<Prediction> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.http_timeout)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Poll until the prediction reaches a terminal state.
    async fn wait_for(&self, mut prediction: Prediction) -> MlResult<Prediction> {
        let deadline = Instant::now() + self.config.prediction_timeout;

        loop {
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction),
                PredictionStatus::Failed | PredictionStatus::Canceled | PredictionStatus::Unknown => {
                    return Err(MlError::PredictionFailed {
                        error: prediction.error_message(),
                        status: prediction.status.as_str().to_string(),
                        id: prediction.id,
                    });
                }
                PredictionStatus::Starting | PredictionStatus::Processing => {}
            }

            if Instant::now() >= deadline {
                return Err(MlError::Timeout(self.config.prediction_timeout.as_secs()));
            }

            tokio::time::sleep(self.config.poll_interval).await;
            debug!(prediction_id = %prediction.id, status = prediction.status.as_str(), "Polling prediction");
            prediction = self.get_prediction(&prediction.urls.get).await?;
        }
    }

    /// Upload a local file and return a URL models can read.
    pub async fn upload_file(&self, path: &Path) -> MlResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let size = bytes.len();

        let form = Form::new().part("content", Part::bytes(bytes).file_name(file_name));
        let response = self
            .http
            .post(format!("{}/files", self.config.base_url))
            .timeout(self.config.http_timeout)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .multipart(form)
            .send()
            .await?;

        let upload: FileUpload = check_status(response).await?.json().await?;
        debug!(path = %path.display(), size, id = ?upload.id, "Uploaded file");
        Ok(upload.urls.get)
    }
}

/// Turn a non-success response into [`MlError::RequestFailed`].
async fn check_status(response: Response) -> MlResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(MlError::RequestFailed { status, body })
}

#[async_trait]
impl VideoService for ReplicateClient {
    async fn generate_video(&self, request: &GenerationRequest) -> MlResult<String> {
        let image_url = self.upload_file(&request.image).await?;
        let input = generation_input(request, &image_url);
        self.run(request.model.model_ref(), input).await
    }

    async fn segment_video(&self, video: &Path, subject: &str) -> MlResult<String> {
        let video_url = self.upload_file(video).await?;
        let model = self.config.sam3_model.clone();
        self.run(&model, segmentation_input(&video_url, subject)).await
    }

    async fn remove_background(&self, video: &Path) -> MlResult<String> {
        let video_url = self.upload_file(video).await?;
        self.run(RMBG_MODEL, background_removal_input(&video_url)).await
    }

    async fn matte_video(&self, video: &Path, output: MatteOutput) -> MlResult<String> {
        let video_url = self.upload_file(video).await?;
        self.run(RVM_MODEL, matting_input(&video_url, output)).await
    }

    async fn download(&self, url: &str, dest: &Path) -> MlResult<u64> {
        let mut request = self.http.get(url).timeout(self.config.download_timeout);
        // Files served by the API itself need the token; CDN delivery URLs do not
        if url.starts_with(&self.config.base_url) {
            request = request.header(reqwest::header::AUTHORIZATION, self.bearer());
        }
        let response = check_status(request.send().await?).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(dest = %dest.display(), bytes = written, "Downloaded artifact");
        Ok(written)
    }
}
