//! FFmpeg Detection Module
//!
//! Locates ffmpeg/ffprobe binaries, either from explicit configuration or
//! from well-known install locations and the system PATH.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::runner::configure_std_command;
use super::{FFmpegError, FFmpegResult};

/// Information about a detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detect FFmpeg, preferring explicitly configured binaries.
///
/// A configured path that does not exist is an error rather than a silent
/// fallback to the system install.
pub fn detect_ffmpeg(
    ffmpeg_override: Option<&Path>,
    ffprobe_override: Option<&Path>,
) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = match ffmpeg_override {
        Some(path) => existing(path)?,
        None => which_binary("ffmpeg")?,
    };
    let ffprobe_path = match ffprobe_override {
        Some(path) => existing(path)?,
        None => which_binary("ffprobe")?,
    };

    let version = get_ffmpeg_version(&ffmpeg_path)?;
    tracing::debug!(
        ffmpeg = %ffmpeg_path.display(),
        ffprobe = %ffprobe_path.display(),
        version = %version,
        "FFmpeg detected"
    );

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

/// Detect FFmpeg from common install locations and the system PATH
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    detect_ffmpeg(None, None)
}

fn existing(path: &Path) -> FFmpegResult<PathBuf> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(FFmpegError::InvalidInput(format!(
            "Configured binary does not exist: {}",
            path.display()
        )))
    }
}

/// Find a binary by name in common locations, then via `which`/`where`
fn which_binary(name: &str) -> FFmpegResult<PathBuf> {
    let file_name = if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };

    if let Some(found) = get_common_ffmpeg_paths()
        .into_iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.exists())
    {
        return Ok(found);
    }

    let locator = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let mut cmd = Command::new(locator);
    cmd.arg(name);
    configure_std_command(&mut cmd);
    let output = cmd.output().map_err(|_| FFmpegError::NotFound)?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Ok(PathBuf::from(first_line));
        }
    }

    Err(FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        // Chocolatey installation
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.arg("-version");
    configure_std_command(&mut cmd);
    let output = cmd.output().map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

/// Parses "ffmpeg version X.Y.Z ..." from the first line of `-version` output
fn parse_version_line(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}
