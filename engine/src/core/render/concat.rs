//! Segment Concatenation
//!
//! Joins encoded segments with ffmpeg's concat demuxer. The manifest is a
//! uniquely named temporary file beside the output and is removed whether or
//! not ffmpeg succeeds.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::core::ffmpeg::{path_arg, EncodeSettings, FFmpegThreadManager, MediaTool};
use crate::core::fs::TempFiles;
use crate::core::{CoreError, CoreResult};

/// How the joined streams are written
#[derive(Debug, Clone, PartialEq)]
pub enum ConcatMode {
    /// `-c copy`; inputs must share codecs and parameters
    StreamCopy,
    /// Re-encode with the given settings
    Reencode(EncodeSettings),
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Concat demuxer manifest listing `segments` in order.
///
/// Single quotes inside paths are written as `'\''`.
pub fn concat_manifest(segments: &[PathBuf]) -> std::io::Result<String> {
    let mut manifest = String::new();
    for segment in segments {
        let path = absolute(segment)?;
        let quoted = path.to_string_lossy().replace('\'', r"'\''");
        manifest.push_str(&format!("file '{}'\n", quoted));
    }
    Ok(manifest)
}

/// Concatenates `segments` into `output`.
pub fn concatenate_segments(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segments: &[PathBuf],
    output: &Path,
    mode: &ConcatMode,
) -> CoreResult<PathBuf> {
    if segments.is_empty() {
        return Err(CoreError::NoSegments);
    }

    let mut temp = TempFiles::beside(output)?;
    let manifest = temp.write("segments_list", "txt", &concat_manifest(segments)?)?;

    let mut args: Vec<String> = vec![
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_arg(&manifest),
    ];
    match mode {
        ConcatMode::StreamCopy => args.extend(["-c".to_string(), "copy".to_string()]),
        ConcatMode::Reencode(settings) => args.extend(settings.to_args()),
    }
    let guard = threads.enter();
    args.extend(guard.thread_args());
    args.push(path_arg(output));

    tool.run_ffmpeg(&args)
        .map_err(|e| CoreError::ConcatFailed(e.to_string()))?;

    if !output.exists() {
        return Err(CoreError::ConcatFailed(format!(
            "No output written to {}",
            output.display()
        )));
    }
    Ok(output.to_path_buf())
}

/// Stream-copies encoded segments into one file.
///
/// Returns `None` for empty input or when ffmpeg fails.
pub fn concatenate_encoded_segments(
    tool: &dyn MediaTool,
    threads: &FFmpegThreadManager,
    segments: &[PathBuf],
    output: &Path,
) -> Option<PathBuf> {
    match concatenate_segments(tool, threads, segments, output, &ConcatMode::StreamCopy) {
        Ok(path) => {
            info!(segments = segments.len(), output = %path.display(), "Concatenated segments");
            Some(path)
        }
        Err(e) => {
            error!(error = %e, "Error concatenating segments");
            None
        }
    }
}
