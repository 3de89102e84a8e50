//! Stage plan: the ordered FFmpeg invocations of one render job.

use std::path::{Path, PathBuf};

use adgen_models::{AssetKind, ModelError, Segment, TimelineEntry};

use crate::captions::sanitize_caption;
use crate::command::{format_seconds, FfmpegCommand};
use crate::error::{MediaResult, RenderStage};
use crate::filters::{drawtext_filter, normalize_graph, FilterChain, NORMALIZED_LABEL};

use super::RenderSettings;

/// The commands a render job will run, built before anything executes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub normalize: FfmpegCommand,
    pub mux: FfmpegCommand,
    /// One pass per caption, each reading the previous pass's output
    pub captions: Vec<FfmpegCommand>,
}

impl RenderPlan {
    /// Build the plan writing all stage outputs under `scratch`.
    pub fn build(
        timeline: &[TimelineEntry],
        audio_path: &Path,
        captions: Option<&[Segment]>,
        total_duration: f64,
        settings: &RenderSettings,
        scratch: &Path,
    ) -> MediaResult<Self> {
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(ModelError::InvalidDuration(total_duration).into());
        }
        if timeline.is_empty() {
            return Err(ModelError::NoAssets.into());
        }

        let normalized = scratch.join("normalized.mp4");
        let muxed = scratch.join("muxed.mp4");

        let normalize = normalize_command(timeline, total_duration, settings, &normalized);

        let mux = FfmpegCommand::new(&muxed)
            .input(&normalized)
            .input(audio_path)
            .map("0:v:0")
            .map("1:a:0")
            .output_args(settings.encoding.video_args())
            .output_args(settings.encoding.audio_args())
            .output_arg("-shortest")
            .faststart();

        let mut passes = Vec::new();
        let mut previous = muxed;
        for segment in captions.unwrap_or_default() {
            let text = sanitize_caption(&segment.text, settings.caption_style.max_chars);
            if text.is_empty() {
                continue;
            }

            let start = segment.start_time.clamp(0.0, total_duration);
            let end = segment.end_time.clamp(start, total_duration);
            let output = scratch.join(format!("captioned_{}.mp4", passes.len()));
            let chain = FilterChain::new().filter(drawtext_filter(
                &text,
                start,
                end,
                &settings.caption_style,
            ));

            passes.push(
                FfmpegCommand::new(&output)
                    .input(&previous)
                    .video_filter(&chain)
                    .output_args(settings.encoding.video_args())
                    .audio_codec("copy")
                    .faststart(),
            );
            previous = output;
        }

        Ok(Self {
            normalize,
            mux,
            captions: passes,
        })
    }

    pub fn caption_passes(&self) -> usize {
        self.captions.len()
    }

    /// Command for a stage, if the plan has one.
    pub fn command(&self, stage: RenderStage) -> Option<&FfmpegCommand> {
        match stage {
            RenderStage::Normalize => Some(&self.normalize),
            RenderStage::Mux => Some(&self.mux),
            RenderStage::Caption(i) => self.captions.get(i),
        }
    }

    /// Stages in execution order.
    pub fn stages(&self) -> Vec<RenderStage> {
        let mut stages = vec![RenderStage::Normalize, RenderStage::Mux];
        stages.extend((0..self.captions.len()).map(RenderStage::Caption));
        stages
    }

    pub fn normalized_output(&self) -> &Path {
        self.normalize.output()
    }

    pub fn muxed_output(&self) -> &Path {
        self.mux.output()
    }

    /// Output of the last stage: the artifact that becomes the final ad.
    pub fn final_output(&self) -> PathBuf {
        self.captions
            .last()
            .unwrap_or(&self.mux)
            .output()
            .to_path_buf()
    }
}

fn normalize_command(
    timeline: &[TimelineEntry],
    total_duration: f64,
    settings: &RenderSettings,
    output: &Path,
) -> FfmpegCommand {
    let fps = settings.profile.fps.to_string();
    let mut cmd = FfmpegCommand::new(output);

    for entry in timeline {
        let slot = format_seconds(entry.duration());
        let args: Vec<String> = match entry.asset.kind {
            // Loop short clips; -t cuts from the clip's own start
            AssetKind::Video => vec!["-stream_loop".into(), "-1".into(), "-t".into(), slot],
            AssetKind::Image => vec![
                "-loop".into(),
                "1".into(),
                "-framerate".into(),
                fps.clone(),
                "-t".into(),
                slot,
            ],
        };
        cmd = cmd.input_with_args(entry.asset.path(), args);
    }

    let slots: Vec<f64> = timeline.iter().map(TimelineEntry::duration).collect();
    let graph = normalize_graph(&slots, total_duration, &settings.profile);

    cmd.filter_complex(&graph)
        .map(format!("[{NORMALIZED_LABEL}]"))
        .no_audio()
        .output_args(settings.encoding.video_args())
        .duration(total_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_models::{plan_timeline, VisualAsset};

    fn timeline() -> Vec<TimelineEntry> {
        let assets = vec![
            VisualAsset::new("/a/clip.mp4", AssetKind::Video, "c", "pexels"),
            VisualAsset::placeholder("/a/fallback.png"),
        ];
        plan_timeline(8.0, &assets).unwrap()
    }

    fn segments() -> Vec<Segment> {
        vec![
            Segment {
                index: 0,
                text: "Fresh bread".into(),
                start_time: 0.0,
                end_time: 4.0,
            },
            Segment {
                index: 1,
                text: "Visit today!".into(),
                start_time: 4.0,
                end_time: 8.0,
            },
        ]
    }

    fn build(captions: Option<&[Segment]>) -> RenderPlan {
        RenderPlan::build(
            &timeline(),
            Path::new("/a/voice.wav"),
            captions,
            8.0,
            &RenderSettings::default(),
            Path::new("/scratch"),
        )
        .unwrap()
    }

    #[test]
    fn test_no_captions_equals_empty_captions() {
        assert_eq!(build(None), build(Some(&[])));
        assert_eq!(build(None).stages(), vec![RenderStage::Normalize, RenderStage::Mux]);
        assert_eq!(build(None).final_output(), PathBuf::from("/scratch/muxed.mp4"));
    }

    #[test]
    fn test_caption_fold_chains_outputs() {
        let segs = segments();
        let plan = build(Some(&segs));
        assert_eq!(plan.caption_passes(), 2);
        assert_eq!(plan.captions[0].inputs()[0].path, PathBuf::from("/scratch/muxed.mp4"));
        assert_eq!(plan.captions[1].inputs()[0].path, plan.captions[0].output());
        assert_eq!(plan.final_output(), plan.captions[1].output());
    }

    #[test]
    fn test_normalize_inputs_by_kind() {
        let args = build(None).normalize.build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-stream_loop -1 -t 4.000000 -i /a/clip.mp4"));
        assert!(joined.contains("-loop 1 -framerate 30 -t 4.000000 -i /a/fallback.png"));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"[vout]".to_string()));
    }

    #[test]
    fn test_mux_maps_video_and_narration() {
        let joined = build(None).mux.build_args().join(" ");
        assert!(joined.contains("-i /scratch/normalized.mp4 -i /a/voice.wav"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-shortest"));
    }

    #[test]
    fn test_unprintable_caption_skipped() {
        let mut segs = segments();
        segs[0].text = "\"''\"".into();
        assert_eq!(build(Some(&segs)).caption_passes(), 1);
    }

    #[test]
    fn test_rejects_empty_timeline() {
        let result = RenderPlan::build(
            &[],
            Path::new("/a/voice.wav"),
            None,
            8.0,
            &RenderSettings::default(),
            Path::new("/scratch"),
        );
        assert!(result.is_err());
    }
}
