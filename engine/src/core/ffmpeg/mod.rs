//! FFmpeg Integration Module
//!
//! Provides the media tool seam used by the caption and render pipelines:
//! - Binary detection (system install or configured paths)
//! - Subprocess runner with probe helpers and frame extraction
//! - Drawtext filter construction and escaping
//! - Process-wide thread budget for concurrent invocations

mod detection;
mod filter;
mod runner;
mod threads;

pub use detection::*;
pub use filter::{
    enable_between, escape_graph, escape_option_value, filter_script, filter_value, DrawText,
};
pub use runner::{path_arg, EncodeSettings, FFmpegRunner, MediaTool};
pub use threads::{is_ci_environment, FFmpegThreadManager, OperationGuard, SystemInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or configure its path.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
