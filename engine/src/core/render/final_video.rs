//! Final Assembly
//!
//! Joins the story segments into `main_video.mp4`, optionally mixes in
//! background music, appends captioned closing credits, and leaves the result
//! as `final_video.mp4` in the output directory.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::concat::{concatenate_encoded_segments, concatenate_segments, ConcatMode};
use crate::core::captions::{create_captions, CaptionEntry, CaptionRenderOptions, CaptionStyle};
use crate::core::ffmpeg::{path_arg, EncodeSettings, FFmpegThreadManager, MediaTool};
use crate::core::fs::TempFiles;
use crate::core::generative::{create_word_level_captions, AlignmentProvider, EvenAlignment};
use crate::core::{CoreError, CoreResult, FrameSize};

pub const MAIN_VIDEO_FILE: &str = "main_video.mp4";
pub const MUSIC_VIDEO_FILE: &str = "main_video_with_music.mp4";
pub const INITIAL_CREDITS_FILE: &str = "initial_credits.mp4";
pub const CLOSING_CREDITS_FILE: &str = "closing_credits.mp4";
pub const FINAL_VIDEO_FILE: &str = "final_video.mp4";

pub const DEFAULT_MUSIC_VOLUME: f64 = 0.3;

/// Credits frame size when the main video cannot be probed
const FALLBACK_CREDITS_SIZE: FrameSize = FrameSize {
    width: 1024,
    height: 1024,
};

const CREDITS_MIN_FONT_SIZE: u32 = 32;
const CREDITS_MAX_FONT_SIZE: u32 = 48;
const CREDITS_STATIC_FONT_SIZE: u32 = 40;

/// Poster, song and lyrics for the closing credits
#[derive(Debug, Clone, PartialEq)]
pub struct ClosingCredits {
    pub poster: PathBuf,
    pub song: PathBuf,
    pub lyrics: String,
}

/// What happens after the segments are joined
#[derive(Debug, Clone, PartialEq)]
pub struct FinalVideoOptions {
    pub background_music: Option<PathBuf>,
    /// Music gain relative to the narration
    pub music_volume: f64,
    pub closing_credits: Option<ClosingCredits>,
    pub captions: CaptionRenderOptions,
}

impl Default for FinalVideoOptions {
    fn default() -> Self {
        Self {
            background_music: None,
            music_volume: DEFAULT_MUSIC_VOLUME,
            closing_credits: None,
            captions: CaptionRenderOptions::default(),
        }
    }
}

// =============================================================================
// Background Music
// =============================================================================

/// Filter graph mixing mono narration (input 0) with stereo music (input 1)
pub fn music_mix_filter(volume: f64) -> String {
    format!(
        "[0:a]aresample=48000,aformat=sample_fmts=fltp[mono];\
         [mono]pan=stereo|c0=c0|c1=c0[v];\
         [1:a]aresample=48000,aformat=sample_fmts=fltp:channel_layouts=stereo,volume={}[m];\
         [v][m]amix=inputs=2:duration=first:dropout_transition=2[aout]",
        volume
    )
}

/// Mixes `music` under the narration of `video`.
///
/// The video stream is copied; the result lasts as long as the narration.
pub fn add_background_music(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    video: &Path,
    music: &Path,
    output: &Path,
    volume: f64,
) -> CoreResult<PathBuf> {
    if !music.exists() {
        return Err(CoreError::ValidationError(format!(
            "Background music not found: {}",
            music.display()
        )));
    }

    let mut args: Vec<String> = vec![
        "-i".into(),
        path_arg(video),
        "-i".into(),
        path_arg(music),
        "-filter_complex".into(),
        music_mix_filter(volume),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "[aout]".into(),
        "-c:v".into(),
        "copy".into(),
    ];
    args.extend(EncodeSettings::slideshow().audio_args());
    let guard = threads.enter();
    args.extend(guard.thread_args());
    args.push(path_arg(output));

    tool.run_ffmpeg(&args)?;
    info!(output = %output.display(), volume, "Added background music");
    Ok(output.to_path_buf())
}

// =============================================================================
// Closing Credits
// =============================================================================

/// Credits captions in the requested style.
///
/// Dynamic credits show the lyrics word by word; static credits show them as
/// one caption for the whole song.
fn credits_captions(
    tool: &dyn MediaTool,
    credits: &ClosingCredits,
    duration: f64,
    style: CaptionStyle,
    aligner: Option<&dyn AlignmentProvider>,
) -> Vec<CaptionEntry> {
    let fallback = EvenAlignment::new(tool);
    let words = create_word_level_captions(aligner, &fallback, &credits.song, &credits.lyrics);
    match style {
        CaptionStyle::Dynamic => words,
        CaptionStyle::Static => {
            if words.is_empty() {
                return Vec::new();
            }
            let text = words
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            vec![CaptionEntry::new(text, 0.0, duration)]
        }
    }
}

fn credits_caption_options(base: &CaptionRenderOptions) -> CaptionRenderOptions {
    let mut options = base.clone();
    options.dynamic.min_font_size = CREDITS_MIN_FONT_SIZE;
    options.dynamic.max_font_size = CREDITS_MAX_FONT_SIZE;
    options.static_captions.font_size = CREDITS_STATIC_FONT_SIZE;
    options
}

fn render_initial_credits(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    credits: &ClosingCredits,
    output: &Path,
) -> CoreResult<f64> {
    if !credits.poster.exists() {
        return Err(CoreError::ValidationError(format!(
            "Credits poster not found: {}",
            credits.poster.display()
        )));
    }
    let duration = tool.probe_duration(&credits.song)?;

    let guard = threads.enter();
    let mut args: Vec<String> = vec![
        "-loop".into(),
        "1".into(),
        "-i".into(),
        path_arg(&credits.poster),
        "-i".into(),
        path_arg(&credits.song),
    ];
    args.extend(EncodeSettings::slideshow().to_args());
    args.extend(guard.thread_args());
    args.extend(["-shortest".to_string(), path_arg(output)]);

    tool.run_ffmpeg(&args)?;
    Ok(duration)
}

/// Builds the captioned closing credits video in `output_dir`.
///
/// Falls back to the uncaptioned credits when captioning fails. Returns `None`
/// when the credits video cannot be built at all.
pub fn generate_closing_credits(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    credits: &ClosingCredits,
    output_dir: &Path,
    options: &CaptionRenderOptions,
    aligner: Option<&dyn AlignmentProvider>,
) -> Option<PathBuf> {
    let initial = output_dir.join(INITIAL_CREDITS_FILE);
    let duration = match render_initial_credits(tool, threads, credits, &initial) {
        Ok(duration) => duration,
        Err(e) => {
            error!(error = %e, "Error generating closing credits");
            return None;
        }
    };

    let captions = credits_captions(tool, credits, duration, options.style, aligner);
    if captions.is_empty() {
        warn!("No lyric timings, using credits without captions");
        return Some(initial);
    }

    let output = output_dir.join(CLOSING_CREDITS_FILE);
    let options = credits_caption_options(options);
    match create_captions(tool, threads, &initial, &captions, &output, &options) {
        Some(path) => {
            info!(output = %path.display(), captions = captions.len(), "Closing credits created");
            Some(path)
        }
        None => {
            warn!("Failed to caption closing credits, using credits without captions");
            Some(initial)
        }
    }
}

// =============================================================================
// Appending
// =============================================================================

/// Re-encode settings that bring appended clips to a common format
pub fn normalized_settings() -> EncodeSettings {
    EncodeSettings {
        tune: None,
        ..EncodeSettings::slideshow()
    }
}

/// Joins clips that may differ in size and codec parameters.
///
/// Each clip is first re-encoded at `size`, then the normalized clips are
/// concatenated with a re-encode.
pub fn append_video_segments(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segments: &[PathBuf],
    output: &Path,
    size: FrameSize,
) -> CoreResult<PathBuf> {
    if segments.is_empty() {
        return Err(CoreError::NoSegments);
    }

    let settings = normalized_settings();
    let mut temp = TempFiles::beside(output)?;
    let mut normalized = Vec::with_capacity(segments.len());
    for segment in segments {
        let target = temp.reserve("normalized", "mp4");
        let mut args: Vec<String> = vec![
            "-i".into(),
            path_arg(segment),
            "-vf".into(),
            format!("scale={}:{}", size.width, size.height),
        ];
        args.extend(settings.to_args());
        let guard = threads.enter();
        args.extend(guard.thread_args());
        args.push(path_arg(&target));
        tool.run_ffmpeg(&args).map_err(|e| CoreError::SegmentEncodeFailed {
            path: segment.display().to_string(),
            reason: e.to_string(),
        })?;
        normalized.push(target);
    }

    concatenate_segments(
        tool,
        threads,
        &normalized,
        output,
        &ConcatMode::Reencode(settings),
    )
}

// =============================================================================
// Pipeline
// =============================================================================

/// Assembles the finished video from story segments.
///
/// Music and credits are optional and their failures are logged and skipped;
/// only a failed concatenation or rename aborts the assembly.
pub fn assemble_final_video(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segments: &[PathBuf],
    output_dir: &Path,
    options: &FinalVideoOptions,
    aligner: Option<&dyn AlignmentProvider>,
) -> Option<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!(dir = %output_dir.display(), error = %e, "Cannot create output directory");
        return None;
    }

    let main_video = output_dir.join(MAIN_VIDEO_FILE);
    let mut current = concatenate_encoded_segments(tool, threads, segments, &main_video)?;

    if let Some(music) = &options.background_music {
        let target = output_dir.join(MUSIC_VIDEO_FILE);
        let volume = options.music_volume;
        match add_background_music(tool, threads, &current, music, &target, volume) {
            Ok(path) => current = path,
            Err(e) => warn!(error = %e, "Failed to add background music, continuing without"),
        }
    }

    if let Some(credits) = &options.closing_credits {
        let caption_options = &options.captions;
        match generate_closing_credits(tool, threads, credits, output_dir, caption_options, aligner) {
            Some(credits_video) => {
                let size = tool.probe_dimensions(&current).unwrap_or_else(|e| {
                    warn!(error = %e, "Cannot probe main video size, using fallback");
                    FALLBACK_CREDITS_SIZE
                });
                let target = output_dir.join(format!("with_credits_{}.mp4", uuid::Uuid::new_v4()));
                let clips = [current.clone(), credits_video];
                match append_video_segments(tool, threads, &clips, &target, size) {
                    Ok(path) => current = path,
                    Err(e) => warn!(error = %e, "Failed to append closing credits"),
                }
            }
            None => warn!("Closing credits unavailable, continuing without"),
        }
    }

    let final_path = output_dir.join(FINAL_VIDEO_FILE);
    let result = if current == final_path {
        Ok(())
    } else {
        std::fs::rename(&current, &final_path)
    };
    match result {
        Ok(()) => {
            info!(output = %final_path.display(), "Final video assembled");
            Some(final_path)
        }
        Err(e) => {
            error!(from = %current.display(), error = %e, "Error finalizing video");
            None
        }
    }
}
