//! FFmpeg Runner Module
//!
//! Executes ffmpeg/ffprobe as blocking subprocesses. Everything above this
//! layer talks to the [`MediaTool`] trait so pipelines can be exercised
//! without a real ffmpeg install.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use image::RgbImage;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::FrameSize;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Suppresses the console window that Windows opens for console binaries.
pub(crate) fn configure_std_command(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Renders a path as a command-line argument
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// =============================================================================
// Media Tool Seam
// =============================================================================

/// Abstraction over the ffmpeg/ffprobe binaries.
///
/// Implementors only provide the two raw invocations; probing and frame
/// extraction are built on top of them.
pub trait MediaTool: Send + Sync {
    /// Runs ffmpeg with `args`, returning stdout.
    ///
    /// A non-zero exit must surface as [`FFmpegError::ExecutionFailed`]
    /// carrying stderr.
    fn run_ffmpeg(&self, args: &[String]) -> FFmpegResult<Vec<u8>>;

    /// Runs ffprobe with `args`, returning stdout as text.
    fn run_ffprobe(&self, args: &[String]) -> FFmpegResult<String>;

    /// Container duration in seconds
    fn probe_duration(&self, input: &Path) -> FFmpegResult<f64> {
        ensure_input(input)?;
        let stdout = self.run_ffprobe(&[
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            path_arg(input),
        ])?;
        parse_duration_output(&stdout)
    }

    /// Width and height of the first video stream
    fn probe_dimensions(&self, input: &Path) -> FFmpegResult<FrameSize> {
        ensure_input(input)?;
        let stdout = self.run_ffprobe(&[
            "-v".into(),
            "error".into(),
            "-select_streams".into(),
            "v:0".into(),
            "-show_entries".into(),
            "stream=width,height".into(),
            "-of".into(),
            "json".into(),
            path_arg(input),
        ])?;
        parse_dimensions_output(&stdout)
    }

    /// Decodes the first video frame into an RGB buffer
    fn extract_first_frame(&self, input: &Path) -> FFmpegResult<RgbImage> {
        ensure_input(input)?;
        let png = self.run_ffmpeg(&[
            "-i".into(),
            path_arg(input),
            "-frames:v".into(),
            "1".into(),
            "-f".into(),
            "image2pipe".into(),
            "-vcodec".into(),
            "png".into(),
            "pipe:1".into(),
        ])?;

        let frame = image::load_from_memory(&png)
            .map_err(|e| FFmpegError::ParseError(format!("Failed to decode frame: {}", e)))?;
        Ok(frame.to_rgb8())
    }
}

fn ensure_input(input: &Path) -> FFmpegResult<()> {
    if input.exists() {
        Ok(())
    } else {
        Err(FFmpegError::InvalidInput(format!(
            "Input file does not exist: {}",
            input.display()
        )))
    }
}

fn parse_duration_output(stdout: &str) -> FFmpegResult<f64> {
    let value = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| FFmpegError::ProbeError("Empty duration output".to_string()))?;

    let duration: f64 = value
        .parse()
        .map_err(|_| FFmpegError::ParseError(format!("Invalid duration: {}", value)))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(FFmpegError::ParseError(format!("Invalid duration: {}", value)));
    }
    Ok(duration)
}

fn parse_dimensions_output(stdout: &str) -> FFmpegResult<FrameSize> {
    let json: serde_json::Value = serde_json::from_str(stdout)
        .map_err(|e| FFmpegError::ParseError(format!("Invalid ffprobe JSON: {}", e)))?;

    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| FFmpegError::ProbeError("No video stream found".to_string()))?;

    let width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;

    if width == 0 || height == 0 {
        return Err(FFmpegError::ProbeError(format!(
            "Invalid video dimensions: {}x{}",
            width, height
        )));
    }
    Ok(FrameSize::new(width, height))
}

// =============================================================================
// Encode Settings
// =============================================================================

/// Encoder arguments shared by the segment pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    /// Video codec (e.g., "libx264")
    pub video_codec: String,
    /// x264 preset (ultrafast .. slow)
    pub preset: Option<String>,
    /// x264 tune (e.g., "stillimage")
    pub tune: Option<String>,
    /// CRF value for quality-based encoding (0-51, lower is better)
    pub crf: Option<u8>,
    /// Pixel format (e.g., "yuv420p")
    pub pixel_format: Option<String>,
    /// Audio codec (e.g., "aac")
    pub audio_codec: String,
    /// Audio bitrate (e.g., "192k")
    pub audio_bitrate: String,
    /// Audio sample rate in Hz
    pub audio_sample_rate: Option<u32>,
    /// Audio channel count
    pub audio_channels: Option<u8>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::segment()
    }
}

impl EncodeSettings {
    /// Fast re-encode used for parallel segment encoding
    pub fn segment() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: Some("ultrafast".to_string()),
            tune: None,
            crf: Some(23),
            pixel_format: None,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            audio_sample_rate: None,
            audio_channels: None,
        }
    }

    /// Still image + narration segments
    pub fn slideshow() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: None,
            tune: Some("stillimage".to_string()),
            crf: None,
            pixel_format: Some("yuv420p".to_string()),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            audio_sample_rate: Some(48_000),
            audio_channels: Some(2),
        }
    }

    /// Video encoder arguments
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.video_codec.clone()];
        if let Some(preset) = &self.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }
        if let Some(tune) = &self.tune {
            args.extend(["-tune".to_string(), tune.clone()]);
        }
        if let Some(crf) = self.crf {
            args.extend(["-crf".to_string(), crf.to_string()]);
        }
        if let Some(pix_fmt) = &self.pixel_format {
            args.extend(["-pix_fmt".to_string(), pix_fmt.clone()]);
        }
        args
    }

    /// Audio encoder arguments
    pub fn audio_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ];
        if let Some(rate) = self.audio_sample_rate {
            args.extend(["-ar".to_string(), rate.to_string()]);
        }
        if let Some(channels) = self.audio_channels {
            args.extend(["-ac".to_string(), channels.to_string()]);
        }
        args
    }

    /// Video followed by audio arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args
    }
}

// =============================================================================
// Subprocess Runner
// =============================================================================

/// FFmpeg Runner executing commands as blocking subprocesses
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from a detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }
}

impl MediaTool for FFmpegRunner {
    fn run_ffmpeg(&self, args: &[String]) -> FFmpegResult<Vec<u8>> {
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut cmd = Command::new(&self.info.ffmpeg_path);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(args);
        configure_std_command(&mut cmd);

        let output = cmd.output().map_err(FFmpegError::ProcessError)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "exit status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    fn run_ffprobe(&self, args: &[String]) -> FFmpegResult<String> {
        tracing::debug!(args = ?args, "Running ffprobe");

        let mut cmd = Command::new(&self.info.ffprobe_path);
        cmd.args(args);
        configure_std_command(&mut cmd);

        let output = cmd.output().map_err(FFmpegError::ProcessError)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
