//! Story Segments
//!
//! One story line becomes one segment: its still image looped for the length
//! of its narration, then captioned. A failed captioning step keeps the plain
//! segment.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::core::captions::{create_captions, CaptionEntry, CaptionRenderOptions, CaptionStyle};
use crate::core::ffmpeg::{path_arg, EncodeSettings, FFmpegThreadManager, MediaTool};
use crate::core::generative::{align_or_distribute, AlignmentProvider, EvenAlignment};
use crate::core::{CoreError, CoreResult};

/// Default location for segments created without an explicit output
pub fn default_segment_path() -> PathBuf {
    std::env::temp_dir()
        .join("storyreel")
        .join(format!("segment_{}.mp4", uuid::Uuid::new_v4()))
}

/// Loops `image` for the duration of `audio`.
///
/// Returns `None` after logging when the audio cannot be probed or ffmpeg
/// fails.
pub fn create_video_segment(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    image: &Path,
    audio: &Path,
    output: Option<&Path>,
) -> Option<PathBuf> {
    let output = output.map_or_else(default_segment_path, Path::to_path_buf);
    match render_video_segment(tool, threads, image, audio, &output) {
        Ok(path) => {
            info!(output = %path.display(), "Video segment created");
            Some(path)
        }
        Err(e) => {
            error!(
                image = %image.display(),
                audio = %audio.display(),
                error = %e,
                "Error creating video segment"
            );
            None
        }
    }
}

fn render_video_segment(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    image: &Path,
    audio: &Path,
    output: &Path,
) -> CoreResult<PathBuf> {
    if !image.exists() {
        return Err(CoreError::ValidationError(format!(
            "Image not found: {}",
            image.display()
        )));
    }
    let duration = tool.probe_duration(audio)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let guard = threads.enter();
    let mut args: Vec<String> = vec![
        "-loop".into(),
        "1".into(),
        "-i".into(),
        path_arg(image),
        "-i".into(),
        path_arg(audio),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
    ];
    args.extend(EncodeSettings::slideshow().to_args());
    args.extend(guard.thread_args());
    args.extend(["-t".to_string(), format!("{:.3}", duration), path_arg(output)]);

    tool.run_ffmpeg(&args)?;
    Ok(output.to_path_buf())
}

/// Path of the captioned variant of `segment`
pub fn captioned_segment_path(segment: &Path) -> PathBuf {
    let stem = segment
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());
    segment.with_file_name(format!("{}_captioned.mp4", stem))
}

/// Captions `segment` with its narration `text`.
///
/// Dynamic captions use word timings from `aligner`, falling back to even
/// distribution over the audio. Static captions show the whole line for the
/// full segment. Returns the original segment when captioning fails.
pub fn caption_segment(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segment: &Path,
    audio: &Path,
    text: &str,
    options: &CaptionRenderOptions,
    aligner: Option<&dyn AlignmentProvider>,
) -> PathBuf {
    let captions = match options.style {
        CaptionStyle::Dynamic => {
            let fallback = EvenAlignment::new(tool);
            let words = align_or_distribute(aligner, &fallback, audio, text);
            let (Some(first), Some(last)) = (words.first(), words.last()) else {
                warn!(segment = %segment.display(), "No word timings, using raw video");
                return segment.to_path_buf();
            };
            vec![CaptionEntry::new(text, first.start, last.end).with_timed_words(words.clone())]
        }
        CaptionStyle::Static => vec![CaptionEntry::open_ended(text, 0.0)],
    };

    let output = captioned_segment_path(segment);
    match create_captions(tool, threads, segment, &captions, &output, options) {
        Some(path) => path,
        None => {
            warn!(segment = %segment.display(), "Failed to add captions, using raw video");
            segment.to_path_buf()
        }
    }
}

/// One story line: image + narration into a captioned segment
#[derive(Debug, Clone, PartialEq)]
pub struct StoryLine {
    pub text: String,
    pub image: PathBuf,
    pub audio: PathBuf,
}

/// Builds the captioned segment for line `index` inside `output_dir`.
pub fn build_story_segment(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    line: &StoryLine,
    index: usize,
    output_dir: &Path,
    options: &CaptionRenderOptions,
    aligner: Option<&dyn AlignmentProvider>,
) -> Option<PathBuf> {
    let output = output_dir.join(format!("segment_{}_initial.mp4", index));
    let segment = create_video_segment(tool, threads, &line.image, &line.audio, Some(&output))?;
    Some(caption_segment(
        tool,
        threads,
        &segment,
        &line.audio,
        &line.text,
        options,
        aligner,
    ))
}
