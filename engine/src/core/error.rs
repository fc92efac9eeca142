//! StoryReel Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::ffmpeg::FFmpegError;
use super::TimeSec;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Frame Analysis Errors
    // =========================================================================
    #[error("Invalid ROI {width}x{height} at ({x}, {y}) for {frame_width}x{frame_height} frame")]
    InvalidRoi {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Frame could not be analyzed: {0}")]
    FrameAnalysisFailed(String),

    // =========================================================================
    // Caption Errors
    // =========================================================================
    #[error("Invalid time range: {0}~{1} seconds")]
    InvalidTimeRange(TimeSec, TimeSec),

    #[error("No words to caption")]
    NoWords,

    #[error("Font error: {0}")]
    FontError(String),

    #[error("Caption render failed: {0}")]
    CaptionRenderFailed(String),

    // =========================================================================
    // Encoding Errors
    // =========================================================================
    #[error("No segments to process")]
    NoSegments,

    #[error("Segment encode failed for {path}: {reason}")]
    SegmentEncodeFailed { path: String, reason: String },

    #[error("Concatenation failed: {0}")]
    ConcatFailed(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Alignment failed: {0}")]
    AlignmentFailed(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error(transparent)]
    FFmpeg(#[from] FFmpegError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_roi_display() {
        let err = CoreError::InvalidRoi {
            x: 10,
            y: 20,
            width: 0,
            height: 40,
            frame_width: 100,
            frame_height: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x40"));
        assert!(msg.contains("100x100"));
    }

    #[test]
    fn test_ffmpeg_error_is_transparent() {
        let err: CoreError = FFmpegError::NotFound.into();
        assert!(err.to_string().contains("FFmpeg not found"));
    }
}
