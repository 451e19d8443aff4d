use std::path::Path;
use std::process::Command;

use animloop_media::check_ffmpeg;
use animloop_models::encoding::{H264_CODEC, VP9_CODEC};
use animloop_worker::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env();

    let work_dir = config.work_dir.clone().unwrap_or_else(std::env::temp_dir);
    println!("animloop-selfcheck: starting with work_dir={}", work_dir.display());
    ensure_workdir(&work_dir).await?;
    ensure_ffmpeg_encoders(&[VP9_CODEC, H264_CODEC])?;
    ensure_env_present(&["REPLICATE_API_TOKEN"])?;

    println!("animloop-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::Builder::new().prefix("animloop-selfcheck-").tempdir_in(path)?;
    probe.close()?;
    Ok(())
}

fn ensure_ffmpeg_encoders(encoders: &[&str]) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;

    let output = Command::new(&ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| anyhow::anyhow!("ffmpeg -encoders failed to start: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffmpeg -encoders failed: {:?}", output.status));
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    for encoder in encoders {
        if !listing.split_whitespace().any(|word| word == *encoder) {
            return Err(anyhow::anyhow!("ffmpeg was built without the {} encoder", encoder));
        }
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
