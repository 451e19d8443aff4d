//! End-to-end orchestrator runs against in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

use animloop_media::plan::PlanWarning;
use animloop_media::{FfmpegCommand, MediaEncoder, MediaError, MediaResult};
use animloop_ml_client::{MatteOutput, MlResult, VideoService};
use animloop_models::{AssetKind, GenerationRequest, MattingMethod, MethodRequest, VideoModel};
use animloop_worker::{PipelineConfig, PipelineOrchestrator, RunRequest, WorkerError};

#[derive(Clone, Default)]
struct FakeService {
    calls: Arc<Mutex<Vec<String>>>,
    /// (path, existed when generation was requested)
    generation_images: Arc<Mutex<Vec<(PathBuf, bool)>>>,
    /// `loop_video` of each generation request
    generation_loops: Arc<Mutex<Vec<bool>>>,
}

impl FakeService {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoService for FakeService {
    async fn generate_video(&self, request: &GenerationRequest) -> MlResult<String> {
        self.record(format!("generate:{}", request.model));
        self.generation_images
            .lock()
            .unwrap()
            .push((request.image.clone(), request.image.is_file()));
        self.generation_loops.lock().unwrap().push(request.loop_video);
        Ok("https://cdn.test/generated.mp4".to_string())
    }

    async fn segment_video(&self, _video: &Path, subject: &str) -> MlResult<String> {
        self.record(format!("segment:{subject}"));
        Ok("https://cdn.test/segmentation.mp4".to_string())
    }

    async fn remove_background(&self, _video: &Path) -> MlResult<String> {
        self.record("remove_background".to_string());
        Ok("https://cdn.test/green.mp4".to_string())
    }

    async fn matte_video(&self, _video: &Path, output: MatteOutput) -> MlResult<String> {
        self.record(format!("matte:{}", output.as_input()));
        Ok(format!("https://cdn.test/{}.mp4", output.as_input()))
    }

    async fn download(&self, url: &str, dest: &Path) -> MlResult<u64> {
        self.record(format!("download:{}", dest.file_name().unwrap().to_string_lossy()));
        tokio::fs::write(dest, url.as_bytes()).await?;
        Ok(url.len() as u64)
    }
}

#[derive(Clone, Default)]
struct FakeEncoder {
    commands: Arc<Mutex<Vec<(String, Duration)>>>,
    fail: bool,
}

impl FakeEncoder {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    fn ensure_available(&self) -> MediaResult<PathBuf> {
        Ok(PathBuf::from("/usr/bin/ffmpeg"))
    }

    async fn encode(&self, cmd: &FfmpegCommand, timeout: Duration) -> MediaResult<()> {
        self.commands
            .lock()
            .unwrap()
            .push((cmd.build_args().join(" "), timeout));

        for input in cmd.inputs() {
            if !input.path.is_file() {
                return Err(MediaError::FileNotFound(input.path.clone()));
            }
        }
        if self.fail {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Conversion failed!".to_string()),
                Some(1),
            ));
        }
        tokio::fs::write(cmd.output(), vec![0u8; 4096]).await?;
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    service: FakeService,
    encoder: FakeEncoder,
}

impl Fixture {
    fn new() -> Self {
        Self::with_encoder(FakeEncoder::default())
    }

    fn with_encoder(encoder: FakeEncoder) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            service: FakeService::default(),
            encoder,
        }
    }

    fn work_base(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    fn orchestrator(&self) -> PipelineOrchestrator<FakeService, FakeEncoder> {
        let config = PipelineConfig {
            work_dir: Some(self.work_base()),
            ..PipelineConfig::default()
        };
        PipelineOrchestrator::new(self.service.clone(), self.encoder.clone(), config)
    }

    fn save(&self, name: &str, image: DynamicImage) -> PathBuf {
        let path = self.dir.path().join(name);
        image.save(&path).unwrap();
        path
    }

    fn request(&self, image: PathBuf) -> RunRequest {
        RunRequest {
            output: Some(self.dir.path().join("out").join("result.webm")),
            ..RunRequest::new(image, "the character waves")
        }
    }

    fn leftover_workdirs(&self) -> usize {
        match std::fs::read_dir(self.work_base()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Opaque image with a gradient border, so no flat background.
fn gradient_rgb() -> RgbImage {
    RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8]))
}

fn cyan_cutout() -> DynamicImage {
    let mut img = RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 0]));
    for x in 16..48 {
        for y in 8..40 {
            img.put_pixel(x, y, Rgba([0, 255, 255, 255]));
        }
    }
    DynamicImage::ImageRgba8(img)
}

#[tokio::test]
async fn test_flat_alpha_character_warns_and_still_encodes() {
    let fx = Fixture::new();
    let base = gradient_rgb();
    let flat = RgbaImage::from_fn(64, 48, |x, y| {
        let p = base.get_pixel(x, y);
        Rgba([p[0], p[1], p[2], 255])
    });
    let image = fx.save("flat.png", DynamicImage::ImageRgba8(flat));

    let outcome = fx.orchestrator().run(&fx.request(image)).await.unwrap();

    assert_eq!(outcome.warnings, vec![PlanWarning::FlatSourceAlpha]);
    assert_eq!(outcome.method, MattingMethod::Sam3);
    assert!(outcome.output.is_file());
    assert_eq!(outcome.bytes, 4096);
    assert_eq!(fx.leftover_workdirs(), 0);
}

#[tokio::test]
async fn test_opaque_without_border_segments() {
    let fx = Fixture::new();
    let image = fx.save("photo.png", DynamicImage::ImageRgb8(gradient_rgb()));

    let outcome = fx.orchestrator().run(&fx.request(image)).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Sam3);
    assert!(outcome.key_color.is_none());
    assert_eq!(
        fx.service.calls(),
        vec![
            "generate:kling",
            "download:generated.mp4",
            "segment:character",
            "download:segmentation.mp4",
        ]
    );

    let commands = fx.encoder.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].contains("tmix=frames=3,dilation,dilation"));
    assert!(commands[0].contains("-shortest"));
}

#[tokio::test]
async fn test_transparent_cutout_bakes_and_keys() {
    let fx = Fixture::new();
    let image = fx.save("hero.png", cyan_cutout());

    let outcome = fx.orchestrator().run(&fx.request(image)).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Chromakey);
    assert_eq!(outcome.key_color.as_ref().map(|k| k.hex()), Some("FF0000"));

    let images = fx.service.generation_images.lock().unwrap().clone();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].0.file_name().unwrap(), "baked.png");
    assert!(images[0].1, "baked image must exist when generation starts");
    assert!(!images[0].0.exists(), "working directory must be removed");

    let commands = fx.encoder.commands();
    assert!(commands[0].contains("chromakey=0xFF0000:0.15:0.05,format=yuva420p"));
    assert!(commands[0].contains("-metadata:s:v:0 alpha_mode=1"));
}

#[tokio::test]
async fn test_solid_border_keys_detected_color_without_baking() {
    let fx = Fixture::new();
    let mut img = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
    for x in 10..30 {
        for y in 10..30 {
            img.put_pixel(x, y, Rgb([180, 40, 40]));
        }
    }
    let image = fx.save("sticker.png", DynamicImage::ImageRgb8(img));

    let outcome = fx.orchestrator().run(&fx.request(image.clone())).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Chromakey);
    let key = outcome.key_color.unwrap();
    assert!(key.is_detected());
    assert_eq!(key.hex(), "FFFFFF");

    let images = fx.service.generation_images.lock().unwrap().clone();
    assert_eq!(images[0].0, image);
}

#[tokio::test]
async fn test_mask_overrides_background_asset() {
    let fx = Fixture::new();
    let image = fx.save("scene.png", DynamicImage::ImageRgb8(gradient_rgb()));
    let mut mask = RgbaImage::from_pixel(31, 20, Rgba([255, 255, 255, 0]));
    mask.put_pixel(10, 10, Rgba([255, 255, 255, 255]));
    let mask = fx.save("mask.png", DynamicImage::ImageRgba8(mask));

    let request = RunRequest {
        asset: AssetKind::Background,
        mask: Some(mask),
        ..fx.request(image)
    };
    let outcome = fx.orchestrator().run(&request).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Mask);
    let commands = fx.encoder.commands.lock().unwrap().clone();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].0.contains("-loop 1 -i"));
    assert!(commands[0].0.contains("alphaextract,scale=32:20 -t 10 -r 24 -c:v libx264"));
    assert_eq!(commands[0].1, Duration::from_secs(120));
    assert!(commands[1].0.contains("[0:v]scale=32:20[vid];[vid][1:v]alphamerge[out]"));
    assert_eq!(commands[1].1, Duration::from_secs(600));
}

#[tokio::test]
async fn test_flat_mask_warns_and_still_merges() {
    let fx = Fixture::new();
    let image = fx.save("hero.png", DynamicImage::ImageRgb8(gradient_rgb()));
    let mask = fx.save(
        "solid-mask.png",
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 30, Rgba([255, 255, 255, 255]))),
    );

    let request = RunRequest {
        mask: Some(mask),
        ..fx.request(image)
    };
    let outcome = fx.orchestrator().run(&request).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Mask);
    assert_eq!(outcome.warnings, vec![PlanWarning::FlatMaskAlpha]);
    let commands = fx.encoder.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].contains("alphaextract,scale=40:30"));
    assert!(commands[1].contains("alphamerge[out]"));
    assert!(outcome.output.is_file());
    assert_eq!(fx.leftover_workdirs(), 0);
}

#[tokio::test]
async fn test_loop_only_reaches_models_with_end_frame() {
    let fx = Fixture::new();
    let image = fx.save("hero.png", DynamicImage::ImageRgb8(gradient_rgb()));

    for model in [VideoModel::Kling, VideoModel::Minimax] {
        let request = RunRequest {
            model,
            loop_video: true,
            ..fx.request(image.clone())
        };
        fx.orchestrator().run(&request).await.unwrap();
    }

    assert_eq!(*fx.service.generation_loops.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn test_background_asset_is_opaque() {
    let fx = Fixture::new();
    let image = fx.save("bg.png", cyan_cutout());

    let request = RunRequest {
        asset: AssetKind::Background,
        ..fx.request(image)
    };
    let outcome = fx.orchestrator().run(&request).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Background);
    let commands = fx.encoder.commands();
    assert!(commands[0].contains("-pix_fmt yuv420p -b:v 600k -crf 36"));
    assert!(!commands[0].contains("alpha_mode"));
    assert_eq!(fx.service.calls(), vec!["generate:kling", "download:generated.mp4"]);
}

#[tokio::test]
async fn test_forced_rvm_mattes_twice() {
    let fx = Fixture::new();
    let image = fx.save("person.png", cyan_cutout());

    let request = RunRequest {
        method: MethodRequest::Rvm,
        ..fx.request(image)
    };
    let outcome = fx.orchestrator().run(&request).await.unwrap();

    assert_eq!(outcome.method, MattingMethod::Rvm);
    let calls = fx.service.calls();
    assert_eq!(calls[2], "matte:alpha-mask");
    assert_eq!(calls[4], "matte:foreground-mask");

    let commands = fx.encoder.commands();
    let fg = commands[0].find("foreground.mp4").unwrap();
    let alpha = commands[0].find("alpha.mp4").unwrap();
    assert!(fg < alpha, "foreground is input 0, alpha input 1");
}

#[tokio::test]
async fn test_forced_rmbg_removes_background() {
    let fx = Fixture::new();
    let image = fx.save("thing.png", DynamicImage::ImageRgb8(gradient_rgb()));

    let request = RunRequest {
        method: MethodRequest::Rmbg,
        ..fx.request(image)
    };
    fx.orchestrator().run(&request).await.unwrap();

    assert!(fx.service.calls().contains(&"remove_background".to_string()));
    assert!(fx.encoder.commands()[0].contains("chromakey=0x00FF00:0.28:0.02"));
}

#[tokio::test]
async fn test_encoder_failure_cleans_up_and_reports_tail() {
    let fx = Fixture::with_encoder(FakeEncoder::failing());
    let image = fx.save("hero.png", cyan_cutout());

    let err = fx.orchestrator().run(&fx.request(image)).await.unwrap_err();

    assert!(matches!(err, WorkerError::Media(MediaError::FfmpegFailed { .. })));
    assert!(!err.is_precondition());
    assert_eq!(err.diagnostic_tail(), Some("Conversion failed!"));
    assert_eq!(fx.leftover_workdirs(), 0);
}

#[tokio::test]
async fn test_missing_input_fails_before_any_call() {
    let fx = Fixture::new();
    let request = fx.request(fx.dir.path().join("missing.png"));

    let err = fx.orchestrator().run(&request).await.unwrap_err();

    assert!(matches!(err, WorkerError::InputNotFound(_)));
    assert!(err.is_precondition());
    assert!(fx.service.calls().is_empty());
    assert!(fx.encoder.commands().is_empty());
}

#[tokio::test]
async fn test_unsupported_duration_is_rejected() {
    let fx = Fixture::new();
    let image = fx.save("photo.png", DynamicImage::ImageRgb8(gradient_rgb()));
    let request = RunRequest {
        duration_secs: 7,
        ..fx.request(image)
    };

    let err = fx.orchestrator().run(&request).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidInput(_)));
    assert!(fx.service.calls().is_empty());
}
