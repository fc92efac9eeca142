//! Caption Renderer
//!
//! Burns captions into a video with ffmpeg `drawtext` filters.
//!
//! Both modes follow the same three steps: the original audio is stream-copied
//! out, the video is re-rendered without audio through a filter script, and the
//! audio is muxed back in. Every intermediate file lives in a [`TempFiles`]
//! guard so nothing is left behind on failure.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::font::{load_measurer, TextMeasurer};
use super::layout::{layout_caption_windows, LayoutParams};
use super::models::{CaptionEntry, CaptionPosition, CaptionStyle, Word};
use super::timing::{split_into_words, DEFAULT_WORDS_PER_SECOND};
use crate::core::analysis::{analyze_first_frame, DEFAULT_BLOCK_SIZE};
use crate::core::ffmpeg::{
    enable_between, filter_script, path_arg, DrawText, FFmpegThreadManager, MediaTool,
};
use crate::core::fs::TempFiles;
use crate::core::{CoreError, CoreResult, Rgb};

// =============================================================================
// Options
// =============================================================================

/// Per-word animated caption settings
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicCaptionOptions {
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub words_per_second: f64,
    pub font_path: Option<PathBuf>,
    pub roi_block_size: u32,
    /// Inner shadow offset in pixels; the outer shadow uses 1.5x
    pub shadow_offset: (i32, i32),
    pub border_thickness: u32,
}

impl Default for DynamicCaptionOptions {
    fn default() -> Self {
        Self {
            min_font_size: 32,
            max_font_size: 48,
            words_per_second: DEFAULT_WORDS_PER_SECOND,
            font_path: None,
            roi_block_size: DEFAULT_BLOCK_SIZE,
            shadow_offset: (6, 6),
            border_thickness: 4,
        }
    }
}

/// Boxed full-caption settings
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCaptionOptions {
    pub font_size: u32,
    pub font_path: Option<PathBuf>,
    pub position: CaptionPosition,
    pub margin: u32,
    pub box_color: String,
    pub font_color: String,
    /// Share of the frame width a caption line may occupy
    pub max_width_ratio: f64,
}

impl Default for StaticCaptionOptions {
    fn default() -> Self {
        Self {
            font_size: 40,
            font_path: None,
            position: CaptionPosition::Bottom,
            margin: 40,
            box_color: "black@0.5".to_string(),
            font_color: "white".to_string(),
            max_width_ratio: 0.9,
        }
    }
}

/// Caption mode plus the settings for each mode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionRenderOptions {
    pub style: CaptionStyle,
    pub dynamic: DynamicCaptionOptions,
    pub static_captions: StaticCaptionOptions,
}

const OUTER_SHADOW_OPACITY: f64 = 0.3;
const INNER_SHADOW_OPACITY: f64 = 0.6;
const OUTER_SHADOW_SCALE: f64 = 1.5;
const STATIC_BOX_PADDING: u32 = 10;

/// Renders `captions` in the configured style.
pub fn create_captions(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    input: &Path,
    captions: &[CaptionEntry],
    output: &Path,
    options: &CaptionRenderOptions,
) -> Option<PathBuf> {
    match options.style {
        CaptionStyle::Dynamic => {
            create_dynamic_captions(tool, threads, input, captions, output, &options.dynamic)
        }
        CaptionStyle::Static => create_static_captions(
            tool,
            threads,
            input,
            captions,
            output,
            &options.static_captions,
        ),
    }
}

// =============================================================================
// Dynamic Captions
// =============================================================================

/// Renders word-by-word captions inside the calmest region of the frame.
///
/// Returns `None` after logging when any step fails; the caller keeps the
/// uncaptioned video.
pub fn create_dynamic_captions(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    input: &Path,
    captions: &[CaptionEntry],
    output: &Path,
    options: &DynamicCaptionOptions,
) -> Option<PathBuf> {
    match render_dynamic_captions(tool, threads, input, captions, output, options) {
        Ok(path) => {
            info!(output = %path.display(), "Added dynamic captions to video");
            Some(path)
        }
        Err(e) => {
            error!(input = %input.display(), error = %e, "Error adding dynamic captions");
            None
        }
    }
}

pub fn render_dynamic_captions(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    input: &Path,
    captions: &[CaptionEntry],
    output: &Path,
    options: &DynamicCaptionOptions,
) -> CoreResult<PathBuf> {
    let analysis = analyze_first_frame(tool, input, options.roi_block_size)?;
    let roi = analysis.roi;
    debug!(?roi, colors = ?analysis.colors, "Frame analysis complete");

    let words: Vec<Word> = captions
        .iter()
        .flat_map(|caption| split_into_words(caption, options.words_per_second))
        .collect();
    if words.is_empty() {
        return Err(CoreError::NoWords);
    }

    let (measurer, fontfile) = load_measurer(options.font_path.as_deref());
    let params = LayoutParams::new(
        options.min_font_size,
        options.max_font_size,
        roi.width,
        roi.height,
    );
    let layout = layout_caption_windows(words, &params, measurer.as_ref());
    if !layout.dropped_words.is_empty() {
        warn!(
            dropped = layout.dropped_words.len(),
            "Some words did not fit the caption region"
        );
    }
    if layout.placed_word_count() == 0 {
        return Err(CoreError::CaptionRenderFailed(
            "No words fit the caption region".to_string(),
        ));
    }

    let mut temp = TempFiles::beside(output)?;
    let text_color = analysis.colors.text.to_ffmpeg(None);
    let stroke_color = analysis.colors.stroke.to_ffmpeg(None);
    let outer_color = Rgb::BLACK.to_ffmpeg(Some(OUTER_SHADOW_OPACITY));
    let inner_color = Rgb::BLACK.to_ffmpeg(Some(INNER_SHADOW_OPACITY));
    let (shadow_x, shadow_y) = options.shadow_offset;

    let mut filters = Vec::with_capacity(layout.placed_word_count() * 3);
    for window in &layout.windows {
        for word in &window.words {
            let textfile = temp.write("caption_word", "txt", &word.text)?;
            let x = i64::from(roi.x) + i64::from(word.x_position);
            // Enlarged words share the window's baseline
            let lift = i64::from(word.font_size.saturating_sub(window.font_size));
            let y = (i64::from(roi.y) + i64::from(word.y_position) - lift).max(0);
            let enable = enable_between(word.start_time, window.end_time);

            let layer = |dx: f64, dy: f64, color: &str, border: &str| {
                DrawText::new(textfile.clone(), word.font_size, color)
                    .fontfile(fontfile.as_deref())
                    .position(offset(x, dx).to_string(), offset(y, dy).to_string())
                    .border(options.border_thickness, border)
                    .enable(enable.clone())
            };

            filters.push(layer(
                f64::from(shadow_x) * OUTER_SHADOW_SCALE,
                f64::from(shadow_y) * OUTER_SHADOW_SCALE,
                &outer_color,
                &outer_color,
            ));
            filters.push(layer(
                f64::from(shadow_x),
                f64::from(shadow_y),
                &inner_color,
                &inner_color,
            ));
            filters.push(layer(0.0, 0.0, &text_color, &stroke_color));
        }
    }

    info!(
        windows = layout.windows.len(),
        words = layout.placed_word_count(),
        "Rendering dynamic captions"
    );
    burn_in(tool, threads, input, output, &mut temp, &filter_script(&filters))?;
    Ok(output.to_path_buf())
}

fn offset(base: i64, delta: f64) -> i64 {
    (base + delta as i64).max(0)
}

// =============================================================================
// Static Captions
// =============================================================================

/// Renders each caption as one centered, boxed block of text.
///
/// Returns `None` after logging when any step fails, including when the video
/// dimensions cannot be probed.
pub fn create_static_captions(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    input: &Path,
    captions: &[CaptionEntry],
    output: &Path,
    options: &StaticCaptionOptions,
) -> Option<PathBuf> {
    match render_static_captions(tool, threads, input, captions, output, options) {
        Ok(path) => {
            info!(output = %path.display(), "Added static captions to video");
            Some(path)
        }
        Err(e) => {
            error!(input = %input.display(), error = %e, "Error adding static captions");
            None
        }
    }
}

pub fn render_static_captions(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    input: &Path,
    captions: &[CaptionEntry],
    output: &Path,
    options: &StaticCaptionOptions,
) -> CoreResult<PathBuf> {
    let frame = tool.probe_dimensions(input).map_err(|e| {
        CoreError::CaptionRenderFailed(format!("Could not determine video dimensions: {}", e))
    })?;

    let captions: Vec<&CaptionEntry> = captions
        .iter()
        .filter(|c| !c.text.trim().is_empty())
        .collect();
    if captions.is_empty() {
        return Err(CoreError::NoWords);
    }

    let (measurer, fontfile) = load_measurer(options.font_path.as_deref());
    let max_width = (f64::from(frame.width) * options.max_width_ratio.clamp(0.1, 1.0)) as u32;
    let y = match options.position {
        CaptionPosition::Bottom => format!("h-{}-th", options.margin),
        CaptionPosition::Center => "(h-th)/2".to_string(),
    };

    let mut temp = TempFiles::beside(output)?;
    let mut filters = Vec::with_capacity(captions.len());
    for caption in captions {
        let text = wrap_text(&caption.text, options.font_size, max_width, measurer.as_ref());
        let textfile = temp.write("caption_text", "txt", &text)?;
        filters.push(
            DrawText::new(textfile, options.font_size, options.font_color.as_str())
                .fontfile(fontfile.as_deref())
                .position("(w-text_w)/2", y.as_str())
                .boxed(options.box_color.as_str(), STATIC_BOX_PADDING)
                .enable(enable_between(caption.start_time, caption.end_time)),
        );
    }

    info!(captions = filters.len(), width = frame.width, "Rendering static captions");
    burn_in(tool, threads, input, output, &mut temp, &filter_script(&filters))?;
    Ok(output.to_path_buf())
}

/// Greedy word wrap so no line is wider than `max_width`.
///
/// A single word wider than the limit gets a line of its own.
pub fn wrap_text(text: &str, font_size: u32, max_width: u32, measurer: &dyn TextMeasurer) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measurer.text_width(&candidate, font_size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

// =============================================================================
// Shared Pipeline
// =============================================================================

/// Extracts audio, renders `script` over the video, and re-muxes.
fn burn_in(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    input: &Path,
    output: &Path,
    temp: &mut TempFiles,
    script: &str,
) -> CoreResult<()> {
    let temp_audio = temp.reserve("temp_audio", "m4a");
    tool.run_ffmpeg(&[
        "-i".into(),
        path_arg(input),
        "-vn".into(),
        "-acodec".into(),
        "copy".into(),
        path_arg(&temp_audio),
    ])
    .map_err(|e| CoreError::CaptionRenderFailed(format!("Failed to extract audio: {}", e)))?;

    let script_path = temp.write("caption_filter", "txt", script)?;
    let temp_video = temp.reserve("temp_video", "mp4");
    {
        let guard = threads.enter();
        debug!(threads = guard.threads(), "Rendering caption overlay");

        let mut args: Vec<String> = vec![
            "-i".into(),
            path_arg(input),
            "-filter_script:v".into(),
            path_arg(&script_path),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "ultrafast".into(),
        ];
        args.extend(guard.thread_args());
        args.push(path_arg(&temp_video));

        tool.run_ffmpeg(&args).map_err(|e| {
            CoreError::CaptionRenderFailed(format!("Failed to render captions: {}", e))
        })?;
    }

    tool.run_ffmpeg(&[
        "-i".into(),
        path_arg(&temp_video),
        "-i".into(),
        path_arg(&temp_audio),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        path_arg(output),
    ])
    .map_err(|e| {
        CoreError::CaptionRenderFailed(format!("Failed to combine video with audio: {}", e))
    })?;

    Ok(())
}
