//! Replicate request/response types and model inputs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use animloop_models::{GenerationRequest, VideoModel};

use crate::error::{MlError, MlResult};

/// Robust video matting (alpha matte or foreground).
pub const RVM_MODEL: &str =
    "arielreplicate/robust_video_matting:73d2128a371922d5d1abf0712a1d974be0e4e2358cc1218e4e34714767232bac";

/// Video background remover producing a green-screen video.
pub const RMBG_MODEL: &str =
    "nateraw/video-background-remover:ac5c138171b04413a69222c304f67c135e259d46089fc70ef12da685b3c604aa";

/// Default promptable video segmentation model.
pub const DEFAULT_SAM3_MODEL: &str = "meta/sam-3-video";

/// Negative prompt sent with Kling generations.
pub const KLING_NEGATIVE_PROMPT: &str = "blurry, distorted, low quality, watermark";
/// Kling prompt adherence.
pub const KLING_CFG_SCALE: f64 = 0.5;

/// Lifecycle state of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Any status this client does not know; treated as a failure
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded
                | PredictionStatus::Failed
                | PredictionStatus::Canceled
                | PredictionStatus::Unknown
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionUrls {
    pub get: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<String>,
}

/// Prediction resource as returned by create and get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    pub urls: PredictionUrls,
}

impl Prediction {
    /// Error text, whether the service sent a string or an object.
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Body for `POST /predictions` and `POST /models/{owner}/{name}/predictions`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePrediction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub input: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUrls {
    pub get: String,
}

/// Response of `POST /files`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileUpload {
    #[serde(default)]
    pub id: Option<String>,
    pub urls: FileUrls,
}

/// `owner/name` or `owner/name:version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl ModelRef {
    pub fn parse(reference: &str) -> MlResult<Self> {
        let (path, version) = match reference.split_once(':') {
            Some((path, version)) if !version.is_empty() => (path, Some(version.to_string())),
            Some(_) => return Err(MlError::invalid_response(format!("empty version in model '{reference}'"))),
            None => (reference, None),
        };
        match path.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
                version,
            }),
            _ => Err(MlError::invalid_response(format!(
                "model reference '{reference}' is not owner/name[:version]"
            ))),
        }
    }
}

/// Which video the matting model returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatteOutput {
    AlphaMask,
    Foreground,
}

impl MatteOutput {
    /// Value of the model's `output_type` input.
    pub fn as_input(&self) -> &'static str {
        match self {
            MatteOutput::AlphaMask => "alpha-mask",
            MatteOutput::Foreground => "foreground-mask",
        }
    }
}

/// Model input for an image-to-video generation; `image_url` is the
/// uploaded source image.
pub fn generation_input(request: &GenerationRequest, image_url: &str) -> Value {
    match request.model {
        VideoModel::Kling => {
            let mut input = Map::new();
            input.insert("prompt".into(), json!(request.prompt));
            input.insert("start_image".into(), json!(image_url));
            input.insert("duration".into(), json!(request.duration_secs));
            input.insert("mode".into(), json!("standard"));
            input.insert("negative_prompt".into(), json!(KLING_NEGATIVE_PROMPT));
            input.insert("cfg_scale".into(), json!(KLING_CFG_SCALE));
            input.insert("aspect_ratio".into(), json!(request.aspect.as_str()));
            if request.loop_video {
                input.insert("end_image".into(), json!(image_url));
                input.insert("mode".into(), json!("pro"));
            }
            Value::Object(input)
        }
        VideoModel::Minimax => json!({
            "prompt": request.prompt,
            "first_frame_image": image_url,
            "prompt_optimizer": true,
        }),
    }
}

/// Segmentation input: the video and a text prompt naming the subject.
pub fn segmentation_input(video_url: &str, subject: &str) -> Value {
    json!({
        "video": video_url,
        "prompt": subject,
    })
}

pub fn background_removal_input(video_url: &str) -> Value {
    json!({ "video": video_url })
}

pub fn matting_input(video_url: &str, output: MatteOutput) -> Value {
    json!({
        "input_video": video_url,
        "output_type": output.as_input(),
    })
}

/// URL carried by a prediction output.
///
/// Models return either a single URL, a list of URLs, or an object of
/// named URLs; the first string found wins.
pub fn output_url(output: &Value) -> MlResult<url::Url> {
    let candidate = match output {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        Value::Object(map) => map.values().find_map(Value::as_str),
        _ => None,
    };
    let raw = candidate.ok_or_else(|| MlError::invalid_response(format!("prediction output has no URL: {output}")))?;
    Ok(url::Url::parse(raw)?)
}
