//! Run orchestration.
//!
//! Planning is pure and happens first; every external call (generation,
//! matting, downloads, FFmpeg) follows in a fixed order inside a working
//! directory that is removed when the run ends, whatever the outcome.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tempfile::TempDir;
use tracing::{info, Instrument};

use animloop_media::filters::{Artifact, StepTimeout};
use animloop_media::{
    plan_run, prepare_mask, write_baked_source, MediaEncoder, PlanRequest, PlanWarning, PreparedMask, RunPlan,
};
use animloop_ml_client::{MatteOutput, VideoService};
use animloop_models::{AssetKind, GenerationRequest, KeyColor, MattingMethod, MethodRequest, VideoModel};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;

/// Durations the generation backends accept, in seconds.
pub const SUPPORTED_DURATIONS: [u32; 2] = [5, 10];

/// File name of the source composited onto the key color.
const BAKED_IMAGE: &str = "baked.png";

/// One animation request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub image: PathBuf,
    pub prompt: String,
    pub model: VideoModel,
    pub asset: AssetKind,
    pub method: MethodRequest,
    /// Text prompt naming what segmentation should keep
    pub subject: String,
    pub duration_secs: u32,
    pub loop_video: bool,
    pub mask: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(image: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            prompt: prompt.into(),
            model: VideoModel::default(),
            asset: AssetKind::default(),
            method: MethodRequest::default(),
            subject: "character".to_string(),
            duration_secs: 5,
            loop_video: false,
            mask: None,
            output: None,
        }
    }

    /// Explicit output, or `<dir>/<stem>-animated.webm` next to the image.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = self
            .image
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let dir = self.image.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!("{stem}-animated.webm"))
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub output: PathBuf,
    pub bytes: u64,
    pub method: MattingMethod,
    pub key_color: Option<KeyColor>,
    pub warnings: Vec<PlanWarning>,
}

impl RunOutcome {
    /// Output size in MB, rounded to two decimals.
    pub fn size_mb(&self) -> f64 {
        (self.bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Drives one run from source image to encoded output.
pub struct PipelineOrchestrator<S, E> {
    service: S,
    encoder: E,
    config: PipelineConfig,
}

impl<S, E> PipelineOrchestrator<S, E>
where
    S: VideoService,
    E: MediaEncoder,
{
    pub fn new(service: S, encoder: E, config: PipelineConfig) -> Self {
        Self {
            service,
            encoder,
            config,
        }
    }

    /// Check inputs and tools before any expensive work.
    pub fn preflight(&self, request: &RunRequest) -> WorkerResult<()> {
        if !request.image.is_file() {
            return Err(WorkerError::InputNotFound(request.image.clone()));
        }
        if let Some(mask) = &request.mask {
            if !mask.is_file() {
                return Err(WorkerError::InputNotFound(mask.clone()));
            }
        }
        if !SUPPORTED_DURATIONS.contains(&request.duration_secs) {
            return Err(WorkerError::invalid_input(format!(
                "duration must be one of {:?} seconds, got {}",
                SUPPORTED_DURATIONS, request.duration_secs
            )));
        }
        if request.prompt.trim().is_empty() {
            return Err(WorkerError::invalid_input("prompt must not be empty"));
        }
        self.encoder.ensure_available()?;
        Ok(())
    }

    /// Execute a run.
    pub async fn run(&self, request: &RunRequest) -> WorkerResult<RunOutcome> {
        let logger = RunLogger::new("animate");
        let span = logger.create_span();
        self.run_inner(request, &logger).instrument(span).await
    }

    async fn run_inner(&self, request: &RunRequest, logger: &RunLogger) -> WorkerResult<RunOutcome> {
        self.preflight(request)?;
        logger.log_start(&format!("{} ({})", request.image.display(), request.model));

        let source = image::open(&request.image)?;
        let mask = request.mask.as_deref().map(image::open).transpose()?.map(|m| prepare_mask(&m));

        let plan_request = PlanRequest {
            asset: request.asset,
            requested: request.method,
            solid_background: self.config.solid_background,
        };
        let plan = plan_run(&plan_request, &source, mask.as_ref())?;
        for warning in &plan.warnings {
            logger.log_warning(warning_message(*warning));
        }

        let workdir = self.create_workdir()?;
        info!(workdir = %workdir.path().display(), "Created working directory");

        let output = request.output_path();
        let result = self
            .execute(request, logger, &plan, &source, mask.as_ref(), workdir.path(), &output)
            .await;

        if let Err(e) = workdir.close() {
            logger.log_warning(&format!("failed to remove working directory: {e}"));
        }

        let bytes = result?;
        let outcome = RunOutcome {
            run_id: logger.run_id().to_string(),
            output,
            bytes,
            method: plan.method(),
            key_color: plan.key_color.clone(),
            warnings: plan.warnings.clone(),
        };
        logger.log_completion(&format!("{} ({} MB)", outcome.output.display(), outcome.size_mb()));
        Ok(outcome)
    }

    fn create_workdir(&self) -> WorkerResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("animloop-");
        let dir = match &self.config.work_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        request: &RunRequest,
        logger: &RunLogger,
        plan: &RunPlan,
        source: &DynamicImage,
        mask: Option<&PreparedMask>,
        workdir: &Path,
        output: &Path,
    ) -> WorkerResult<u64> {
        let method = plan.method();
        let total = method.step_count();
        let mut step = 1;
        let artifact_path = |artifact: Artifact| workdir.join(artifact.file_name());

        // Generation
        let generation_image = match (&plan.key_color, plan.bake_source) {
            (Some(key), true) => {
                let baked = workdir.join(BAKED_IMAGE);
                write_baked_source(source, key.rgb(), &baked)?;
                baked
            }
            _ => request.image.clone(),
        };
        if let Some(mask) = mask {
            mask.write_png(&artifact_path(Artifact::MaskImage))?;
        }

        let loop_video = request.loop_video && request.model.supports_end_frame();
        if request.loop_video && !loop_video {
            logger.log_warning(&format!(
                "{} does not accept an end frame; generating without a seamless loop",
                request.model
            ));
        }

        logger.log_step(step, total, &format!("Generating animation with {}", request.model));
        let generation = GenerationRequest {
            model: request.model,
            image: generation_image,
            prompt: request.prompt.clone(),
            duration_secs: request.duration_secs,
            aspect: plan.geometry.generation_aspect(),
            loop_video,
        };
        let generated_url = self.service.generate_video(&generation).await?;
        let generated = artifact_path(Artifact::GeneratedVideo);
        self.service.download(&generated_url, &generated).await?;
        step += 1;

        // Remote matting
        match method {
            MattingMethod::Sam3 => {
                logger.log_step(step, total, &format!("Segmenting '{}'", request.subject));
                let url = self.service.segment_video(&generated, &request.subject).await?;
                self.service
                    .download(&url, &artifact_path(Artifact::SegmentationMask))
                    .await?;
                step += 1;
            }
            MattingMethod::Rmbg => {
                logger.log_step(step, total, "Removing background");
                let url = self.service.remove_background(&generated).await?;
                self.service.download(&url, &artifact_path(Artifact::GreenScreen)).await?;
                step += 1;
            }
            MattingMethod::Rvm => {
                logger.log_step(step, total, "Extracting alpha matte");
                let url = self.service.matte_video(&generated, MatteOutput::AlphaMask).await?;
                self.service.download(&url, &artifact_path(Artifact::AlphaMatte)).await?;
                step += 1;

                logger.log_step(step, total, "Extracting foreground");
                let url = self.service.matte_video(&generated, MatteOutput::Foreground).await?;
                self.service.download(&url, &artifact_path(Artifact::Foreground)).await?;
                step += 1;
            }
            MattingMethod::Mask | MattingMethod::Background | MattingMethod::Chromakey => {}
        }

        // Encoding
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        for encode in &plan.encode.steps {
            logger.log_step(step, total, &format!("Encoding ({})", encode.name));
            let cmd = encode.to_command(|a| Some(artifact_path(a)), output)?;
            let timeout = match encode.timeout {
                StepTimeout::MaskClip => self.config.mask_timeout,
                StepTimeout::Encode => self.config.encode_timeout,
            };
            self.encoder.encode(&cmd, timeout).await?;
            step += 1;
        }

        let bytes = tokio::fs::metadata(output).await?.len();
        Ok(bytes)
    }
}

fn warning_message(warning: PlanWarning) -> &'static str {
    match warning {
        PlanWarning::FlatSourceAlpha => "source alpha channel is uniform; treating the image as opaque",
        PlanWarning::FlatMaskAlpha => "mask alpha channel is uniform",
        PlanWarning::KeyMayBeAbsent => "chromakey forced without transparency or a flat background",
    }
}
