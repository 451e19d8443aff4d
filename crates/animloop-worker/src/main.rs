//! Animation CLI binary.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use animloop_media::FfmpegRunner;
use animloop_ml_client::ReplicateClient;
use animloop_models::{AssetKind, MethodRequest, VideoModel};
use animloop_worker::pipeline::SUPPORTED_DURATIONS;
use animloop_worker::{init_tracing, PipelineConfig, PipelineOrchestrator, RunRequest, WorkerError, WorkerResult};

/// Animate a still image into a short video loop for mobile ads.
#[derive(Debug, Parser)]
#[command(name = "animloop", version, about)]
struct Args {
    /// Path to image (PNG/JPG/WEBP)
    image: PathBuf,

    /// Animation prompt
    #[arg(long)]
    prompt: String,

    /// Generation backend (kling, minimax)
    #[arg(long, default_value = "kling")]
    model: VideoModel,

    /// character = transparent output, background = full frame
    #[arg(long = "type", default_value = "character")]
    asset_type: AssetKind,

    /// Matting method (auto, chromakey, sam3, rmbg/universal, rvm/human)
    #[arg(long, visible_alias = "matting", default_value = "auto")]
    method: MethodRequest,

    /// What segmentation should keep
    #[arg(long, default_value = "character")]
    subject: String,

    /// Clip length in seconds (5 or 10)
    #[arg(long, default_value_t = 5, value_parser = parse_duration)]
    duration: u32,

    /// Use the image as both first and last frame for a seamless loop
    #[arg(long = "loop")]
    loop_video: bool,

    /// PNG whose alpha channel is used as the shape mask
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Output file path (default: <image dir>/<stem>-animated.webm)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn parse_duration(value: &str) -> Result<u32, String> {
    let secs: u32 = value.parse().map_err(|_| format!("'{value}' is not a number"))?;
    if SUPPORTED_DURATIONS.contains(&secs) {
        Ok(secs)
    } else {
        Err(format!("duration must be one of {:?}", SUPPORTED_DURATIONS))
    }
}

impl From<Args> for RunRequest {
    fn from(args: Args) -> Self {
        RunRequest {
            image: args.image,
            prompt: args.prompt,
            model: args.model,
            asset: args.asset_type,
            method: args.method,
            subject: args.subject,
            duration_secs: args.duration,
            loop_video: args.loop_video,
            mask: args.mask,
            output: args.output,
        }
    }
}

async fn run(request: RunRequest) -> WorkerResult<()> {
    let service = ReplicateClient::from_env()?;
    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let orchestrator = PipelineOrchestrator::new(service, FfmpegRunner::new(), config);
    orchestrator.preflight(&request)?;

    let outcome = tokio::select! {
        result = orchestrator.run(&request) => result?,
        _ = tokio::signal::ctrl_c() => {
            return Err(WorkerError::Interrupted);
        }
    };

    println!("Done! Output: {} ({} MB)", outcome.output.display(), outcome.size_mb());
    println!(
        "Method: {}{}",
        outcome.method,
        outcome
            .key_color
            .as_ref()
            .map(|k| format!(" (key {k})"))
            .unwrap_or_default()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();

    if let Err(e) = run(args.into()).await {
        error!(precondition = e.is_precondition(), "Run failed: {}", e);
        eprintln!("ERROR: {e}");
        if let Some(tail) = e.diagnostic_tail() {
            eprintln!("{tail}");
        }
        std::process::exit(1);
    }
}
