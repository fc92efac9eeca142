//! StoryReel Core Library
//!
//! Narrated story video pipeline: finds a quiet region of each frame for
//! captions, lays out and burns in per-word or static captions, encodes
//! segments in parallel under a shared ffmpeg thread budget, and assembles the
//! final video with background music and closing credits.
//!
//! All media work goes through the [`core::ffmpeg::MediaTool`] seam;
//! [`core::ffmpeg::FFmpegRunner`] drives the real binaries.

pub mod core;

pub use crate::core::analysis::{analyze_first_frame, find_optimal_roi, FrameAnalysis, Roi};
pub use crate::core::captions::{
    create_captions, create_dynamic_captions, create_srt_captions, create_static_captions,
    CaptionEntry, CaptionRenderOptions, CaptionStyle,
};
pub use crate::core::ffmpeg::{FFmpegRunner, FFmpegThreadManager, MediaTool};
pub use crate::core::render::{
    assemble_final_video, concatenate_encoded_segments, create_video_segment,
    encode_segments_in_parallel, FinalVideoOptions,
};
pub use crate::core::settings::{PipelineConfig, StoryConfig};
pub use crate::core::{CoreError, CoreResult};
