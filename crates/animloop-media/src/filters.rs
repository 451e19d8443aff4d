//! FFmpeg filter graphs and encode steps for each matting method.
//!
//! Steps reference their inputs symbolically through [`Artifact`] so the
//! plan can be built and inspected before any file exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use animloop_models::encoding::{MASK_CLIP_FPS, MASK_CLIP_SECONDS};
use animloop_models::{EncodingConfig, KeyColor, MattingMethod};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::geometry::{round_up_even, GeometryPlan};

/// Chroma-key similarity for the generated-video key pass.
pub const CHROMAKEY_SIMILARITY: &str = "0.15";
/// Chroma-key blend for the generated-video key pass.
pub const CHROMAKEY_BLEND: &str = "0.05";

/// Green-screen key used by the background remover output.
pub const GREEN_SCREEN_KEY: &str = "0x00FF00";

/// Output pad label for complex graphs.
pub const OUTPUT_LABEL: &str = "[out]";

/// Files a step can read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// Video returned by the generation backend
    GeneratedVideo,
    /// User-supplied RGBA mask image
    MaskImage,
    /// Mask image looped into a short grayscale clip
    MaskClip,
    /// Per-frame subject mask from segmentation
    SegmentationMask,
    /// Generated video with the background replaced by green
    GreenScreen,
    /// Foreground video from video matting
    Foreground,
    /// Alpha matte video from video matting
    AlphaMatte,
}

impl Artifact {
    /// Conventional file name inside the working directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::GeneratedVideo => "generated.mp4",
            Artifact::MaskImage => "mask.png",
            Artifact::MaskClip => "mask_clip.mp4",
            Artifact::SegmentationMask => "segmentation.mp4",
            Artifact::GreenScreen => "greenscreen.mp4",
            Artifact::Foreground => "foreground.mp4",
            Artifact::AlphaMatte => "alpha.mp4",
        }
    }
}

/// A filter graph in one of FFmpeg's two syntaxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterGraph {
    /// Single-input chain passed with `-vf`
    Simple { filter: String },
    /// Labelled graph passed with `-filter_complex`, output pad mapped
    Complex { graph: String, output: String },
}

impl FilterGraph {
    pub fn simple(filter: impl Into<String>) -> Self {
        FilterGraph::Simple { filter: filter.into() }
    }

    pub fn complex(graph: impl Into<String>) -> Self {
        FilterGraph::Complex {
            graph: graph.into(),
            output: OUTPUT_LABEL.to_string(),
        }
    }

    /// The graph text as handed to FFmpeg.
    pub fn as_str(&self) -> &str {
        match self {
            FilterGraph::Simple { filter } => filter,
            FilterGraph::Complex { graph, .. } => graph,
        }
    }
}

/// Input of a step, with the options placed before its `-i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInput {
    pub args: Vec<String>,
    pub artifact: Artifact,
}

impl StepInput {
    fn plain(artifact: Artifact) -> Self {
        Self { args: Vec::new(), artifact }
    }

    fn looped(artifact: Artifact) -> Self {
        Self {
            args: vec!["-loop".to_string(), "1".to_string()],
            artifact,
        }
    }
}

/// Where a step writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Final,
    Intermediate(Artifact),
}

/// Which configured timeout bounds a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTimeout {
    MaskClip,
    Encode,
}

/// One encoder invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeStep {
    pub name: String,
    pub inputs: Vec<StepInput>,
    pub graph: FilterGraph,
    pub encoding: EncodingConfig,
    pub duration_secs: Option<u32>,
    pub frame_rate: Option<u32>,
    pub shortest: bool,
    pub destination: Destination,
    pub timeout: StepTimeout,
}

impl EncodeStep {
    fn final_encode(name: &str, inputs: Vec<StepInput>, graph: FilterGraph, encoding: EncodingConfig) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            graph,
            encoding,
            duration_secs: None,
            frame_rate: None,
            shortest: false,
            destination: Destination::Final,
            timeout: StepTimeout::Encode,
        }
    }

    fn with_shortest(mut self) -> Self {
        self.shortest = true;
        self
    }

    /// Concrete command for this step.
    ///
    /// `resolve` maps each artifact to a path; `final_output` is used for
    /// [`Destination::Final`].
    pub fn to_command<F>(&self, resolve: F, final_output: &Path) -> MediaResult<FfmpegCommand>
    where
        F: Fn(Artifact) -> Option<PathBuf>,
    {
        let lookup = |artifact: Artifact| {
            resolve(artifact).ok_or_else(|| {
                MediaError::invalid_plan(format!("step '{}' needs missing artifact {:?}", self.name, artifact))
            })
        };

        let output = match self.destination {
            Destination::Final => final_output.to_path_buf(),
            Destination::Intermediate(artifact) => lookup(artifact)?,
        };

        let mut cmd = FfmpegCommand::new(output);
        for input in &self.inputs {
            cmd = cmd.input_with_args(input.args.iter().cloned(), lookup(input.artifact)?);
        }

        cmd = match &self.graph {
            FilterGraph::Simple { filter } => cmd.video_filter(filter.as_str()),
            FilterGraph::Complex { graph, output } => cmd.filter_complex(graph.as_str()).map(output.as_str()),
        };

        if let Some(seconds) = self.duration_secs {
            cmd = cmd.duration_limit(seconds);
        }
        if let Some(fps) = self.frame_rate {
            cmd = cmd.frame_rate(fps);
        }

        cmd = cmd.encoding(&self.encoding);
        if self.shortest {
            cmd = cmd.shortest();
        }

        Ok(cmd)
    }
}

/// Ordered encode steps for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodePlan {
    pub method: MattingMethod,
    pub steps: Vec<EncodeStep>,
}

impl EncodePlan {
    /// Artifacts the steps read that no earlier step writes; the caller
    /// must provide these.
    pub fn external_inputs(&self) -> Vec<Artifact> {
        let mut produced = Vec::new();
        let mut needed = Vec::new();
        for step in &self.steps {
            for input in &step.inputs {
                if !produced.contains(&input.artifact) && !needed.contains(&input.artifact) {
                    needed.push(input.artifact);
                }
            }
            if let Destination::Intermediate(artifact) = step.destination {
                produced.push(artifact);
            }
        }
        needed
    }

    pub fn final_step(&self) -> Option<&EncodeStep> {
        self.steps.iter().rev().find(|s| s.destination == Destination::Final)
    }
}

/// `alphaextract,scale=MW:MH`
pub fn mask_clip_filter(mask_width: u32, mask_height: u32) -> String {
    format!("alphaextract,scale={}:{}", mask_width, mask_height)
}

/// `[0:v]scale=MW:MH[vid];[vid][1:v]alphamerge[out]`
pub fn mask_merge_graph(mask_width: u32, mask_height: u32) -> String {
    format!(
        "[0:v]scale={}:{}[vid];[vid][1:v]alphamerge{}",
        mask_width, mask_height, OUTPUT_LABEL
    )
}

/// `scale=CW:CH,chromakey=0xHEX:0.15:0.05,format=yuva420p`
pub fn chromakey_filter(geometry: &GeometryPlan, key: &KeyColor) -> String {
    format!(
        "scale={}:{},chromakey={}:{}:{},format=yuva420p",
        geometry.crop_width,
        geometry.crop_height,
        key.ffmpeg_hex(),
        CHROMAKEY_SIMILARITY,
        CHROMAKEY_BLEND
    )
}

/// Segmentation mask merge with temporal smoothing and two dilation passes.
pub fn sam3_graph(geometry: &GeometryPlan) -> String {
    let (w, h) = (geometry.crop_width, geometry.crop_height);
    format!(
        "[0:v]scale={w}:{h}[vid];\
         [1:v]scale={w}:{h},format=gray,tmix=frames=3,dilation,dilation[mask];\
         [vid][mask]alphamerge{OUTPUT_LABEL}"
    )
}

/// Green-screen key, alpha erosion, green despill, then scale and crop.
pub fn rmbg_graph(geometry: &GeometryPlan) -> String {
    format!(
        "[0:v]chromakey={GREEN_SCREEN_KEY}:0.28:0.02,split[rgb][a];\
         [a]alphaextract,erosion=threshold0=255:threshold1=255:threshold2=255:threshold3=255[amask];\
         [rgb][amask]alphamerge,colorchannelmixer=gg=0.8:gb=0.1:gr=0.1,{}{OUTPUT_LABEL}",
        geometry.scale_crop_filter()
    )
}

/// Foreground and alpha matte merged, then scaled and cropped.
pub fn rvm_graph(geometry: &GeometryPlan) -> String {
    format!("[0:v][1:v]alphamerge,{}{OUTPUT_LABEL}", geometry.scale_crop_filter())
}

/// Build the encode steps for `method`.
///
/// `key` is required for `chromakey`; `mask_dims` (source mask size) for
/// `mask`. Mask dimensions are rounded up to even here.
pub fn build_encode_plan(
    geometry: &GeometryPlan,
    method: MattingMethod,
    key: Option<&KeyColor>,
    mask_dims: Option<(u32, u32)>,
) -> MediaResult<EncodePlan> {
    let steps = match method {
        MattingMethod::Mask => {
            let (mw, mh) = mask_dims
                .map(|(w, h)| (round_up_even(w), round_up_even(h)))
                .ok_or_else(|| MediaError::invalid_plan("mask method requires mask dimensions"))?;

            let clip = EncodeStep {
                name: "mask_clip".to_string(),
                inputs: vec![StepInput::looped(Artifact::MaskImage)],
                graph: FilterGraph::simple(mask_clip_filter(mw, mh)),
                encoding: EncodingConfig::for_mask_clip(),
                duration_secs: Some(MASK_CLIP_SECONDS),
                frame_rate: Some(MASK_CLIP_FPS),
                shortest: false,
                destination: Destination::Intermediate(Artifact::MaskClip),
                timeout: StepTimeout::MaskClip,
            };
            let merge = EncodeStep::final_encode(
                "mask_merge",
                vec![StepInput::plain(Artifact::GeneratedVideo), StepInput::plain(Artifact::MaskClip)],
                FilterGraph::complex(mask_merge_graph(mw, mh)),
                EncodingConfig::for_alpha(),
            )
            .with_shortest();

            vec![clip, merge]
        }
        MattingMethod::Background => vec![EncodeStep::final_encode(
            "background",
            vec![StepInput::plain(Artifact::GeneratedVideo)],
            FilterGraph::simple(geometry.scale_crop_filter()),
            EncodingConfig::for_opaque(),
        )],
        MattingMethod::Chromakey => {
            let key = key.ok_or_else(|| MediaError::invalid_plan("chromakey method requires a key color"))?;
            vec![EncodeStep::final_encode(
                "chromakey",
                vec![StepInput::plain(Artifact::GeneratedVideo)],
                FilterGraph::simple(chromakey_filter(geometry, key)),
                EncodingConfig::for_alpha(),
            )]
        }
        MattingMethod::Sam3 => vec![EncodeStep::final_encode(
            "sam3",
            vec![
                StepInput::plain(Artifact::GeneratedVideo),
                StepInput::plain(Artifact::SegmentationMask),
            ],
            FilterGraph::complex(sam3_graph(geometry)),
            EncodingConfig::for_alpha(),
        )
        .with_shortest()],
        MattingMethod::Rmbg => vec![EncodeStep::final_encode(
            "rmbg",
            vec![StepInput::plain(Artifact::GreenScreen)],
            FilterGraph::complex(rmbg_graph(geometry)),
            EncodingConfig::for_alpha(),
        )],
        MattingMethod::Rvm => vec![EncodeStep::final_encode(
            "rvm",
            vec![StepInput::plain(Artifact::Foreground), StepInput::plain(Artifact::AlphaMatte)],
            FilterGraph::complex(rvm_graph(geometry)),
            EncodingConfig::for_alpha(),
        )],
    };

    Ok(EncodePlan { method, steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use animloop_models::Rgb;

    const ALPHA_ARGS: &str = "-c:v libvpx-vp9 -pix_fmt yuva420p -auto-alt-ref 0 -b:v 800k -crf 35 \
                              -speed 4 -row-mt 1 -metadata:s:v:0 alpha_mode=1 -an";

    fn geometry() -> GeometryPlan {
        GeometryPlan::for_source(1000, 500)
    }

    fn workdir_paths(artifact: Artifact) -> Option<PathBuf> {
        Some(PathBuf::from("/work").join(artifact.file_name()))
    }

    fn command_line(step: &EncodeStep) -> String {
        step.to_command(workdir_paths, Path::new("/out/final.webm"))
            .unwrap()
            .build_args()
            .join(" ")
    }

    #[test]
    fn test_chromakey_filter_exact() {
        let key = KeyColor::synthesized(Rgb::new(255, 0, 255));
        let plan = build_encode_plan(&geometry(), MattingMethod::Chromakey, Some(&key), None).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(
            plan.steps[0].graph.as_str(),
            "scale=720:500,chromakey=0xFF00FF:0.15:0.05,format=yuva420p"
        );
        assert_eq!(
            command_line(&plan.steps[0]),
            format!(
                "-y -v error -progress pipe:2 -i /work/generated.mp4 \
                 -vf scale=720:500,chromakey=0xFF00FF:0.15:0.05,format=yuva420p {ALPHA_ARGS} /out/final.webm"
            )
        );
    }

    #[test]
    fn test_chromakey_without_key_is_invalid() {
        let result = build_encode_plan(&geometry(), MattingMethod::Chromakey, None, None);
        assert!(matches!(result, Err(MediaError::InvalidPlan(_))));
    }

    #[test]
    fn test_background_uses_opaque_encoder() {
        let plan = build_encode_plan(&geometry(), MattingMethod::Background, None, None).unwrap();
        assert_eq!(
            command_line(&plan.steps[0]),
            "-y -v error -progress pipe:2 -i /work/generated.mp4 \
             -vf scale=828:576:force_original_aspect_ratio=increase,crop=720:500 \
             -c:v libvpx-vp9 -pix_fmt yuv420p -b:v 600k -crf 36 -speed 4 -row-mt 1 -an /out/final.webm"
        );
        assert!(!plan.steps[0].encoding.has_alpha());
    }

    #[test]
    fn test_mask_two_steps() {
        let plan = build_encode_plan(&geometry(), MattingMethod::Mask, None, Some((641, 480))).unwrap();
        assert_eq!(plan.steps.len(), 2);

        let clip = &plan.steps[0];
        assert_eq!(clip.destination, Destination::Intermediate(Artifact::MaskClip));
        assert_eq!(clip.timeout, StepTimeout::MaskClip);
        assert_eq!(
            command_line(clip),
            "-y -v error -progress pipe:2 -loop 1 -i /work/mask.png \
             -vf alphaextract,scale=642:480 -t 10 -r 24 -c:v libx264 -pix_fmt yuv420p /work/mask_clip.mp4"
        );

        let merge = &plan.steps[1];
        assert_eq!(merge.graph.as_str(), "[0:v]scale=642:480[vid];[vid][1:v]alphamerge[out]");
        let line = command_line(merge);
        assert!(line.contains("-i /work/generated.mp4 -i /work/mask_clip.mp4 -filter_complex"));
        assert!(line.ends_with(&format!("-map [out] {ALPHA_ARGS} -shortest /out/final.webm")));

        assert_eq!(plan.external_inputs(), vec![Artifact::MaskImage, Artifact::GeneratedVideo]);
    }

    #[test]
    fn test_mask_without_dims_is_invalid() {
        assert!(build_encode_plan(&geometry(), MattingMethod::Mask, None, None).is_err());
    }

    #[test]
    fn test_sam3_graph_exact() {
        let plan = build_encode_plan(&geometry(), MattingMethod::Sam3, None, None).unwrap();
        let step = &plan.steps[0];
        assert_eq!(
            step.graph.as_str(),
            "[0:v]scale=720:500[vid];[1:v]scale=720:500,format=gray,tmix=frames=3,dilation,dilation[mask];\
             [vid][mask]alphamerge[out]"
        );
        assert!(step.shortest);
        assert_eq!(
            plan.external_inputs(),
            vec![Artifact::GeneratedVideo, Artifact::SegmentationMask]
        );
    }

    #[test]
    fn test_rmbg_graph_exact() {
        let plan = build_encode_plan(&geometry(), MattingMethod::Rmbg, None, None).unwrap();
        assert_eq!(
            plan.steps[0].graph.as_str(),
            "[0:v]chromakey=0x00FF00:0.28:0.02,split[rgb][a];\
             [a]alphaextract,erosion=threshold0=255:threshold1=255:threshold2=255:threshold3=255[amask];\
             [rgb][amask]alphamerge,colorchannelmixer=gg=0.8:gb=0.1:gr=0.1,\
             scale=828:576:force_original_aspect_ratio=increase,crop=720:500[out]"
        );
        assert_eq!(plan.external_inputs(), vec![Artifact::GreenScreen]);
    }

    #[test]
    fn test_rvm_graph_exact() {
        let plan = build_encode_plan(&geometry(), MattingMethod::Rvm, None, None).unwrap();
        assert_eq!(
            plan.steps[0].graph.as_str(),
            "[0:v][1:v]alphamerge,scale=828:576:force_original_aspect_ratio=increase,crop=720:500[out]"
        );
        assert_eq!(plan.external_inputs(), vec![Artifact::Foreground, Artifact::AlphaMatte]);
    }

    #[test]
    fn test_every_alpha_method_shares_encoder() {
        let key = KeyColor::synthesized(Rgb::new(0, 255, 255));
        for &method in MattingMethod::ALL {
            let plan = build_encode_plan(&geometry(), method, Some(&key), Some((10, 10))).unwrap();
            let last = plan.final_step().unwrap();
            assert_eq!(last.encoding.has_alpha(), method.produces_alpha(), "{method}");
            if method.produces_alpha() {
                assert!(command_line(last).contains(ALPHA_ARGS), "{method}");
            }
        }
    }

    #[test]
    fn test_missing_artifact_is_reported() {
        let plan = build_encode_plan(&geometry(), MattingMethod::Sam3, None, None).unwrap();
        let result = plan.steps[0].to_command(
            |a| (a == Artifact::GeneratedVideo).then(|| PathBuf::from("/work/generated.mp4")),
            Path::new("/out/final.webm"),
        );
        assert!(matches!(result, Err(MediaError::InvalidPlan(_))));
    }
}
