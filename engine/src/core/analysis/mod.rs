//! Frame Analysis Module
//!
//! Chooses where captions go and which colors they use, from a single
//! representative frame of the segment.

mod contrast;
mod roi;

pub use contrast::{get_contrasting_color, CaptionColors};
pub use roi::{find_roi_in_frame, ActivityMap, Roi, DEFAULT_BLOCK_SIZE};

use std::path::Path;

use serde::Serialize;

use crate::core::ffmpeg::MediaTool;
use crate::core::{CoreError, CoreResult, FrameSize};

/// Placement and colors derived from a video's first frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameAnalysis {
    pub frame_size: FrameSize,
    pub roi: Roi,
    pub colors: CaptionColors,
}

/// Extracts the first frame of `video` and computes ROI and caption colors.
pub fn analyze_first_frame(
    tool: &dyn MediaTool,
    video: &Path,
    block_size: u32,
) -> CoreResult<FrameAnalysis> {
    let frame = tool.extract_first_frame(video)?;
    let (width, height) = frame.dimensions();

    let roi = find_roi_in_frame(&frame, block_size).ok_or_else(|| {
        CoreError::FrameAnalysisFailed(format!("{}x{} frame has no usable ROI", width, height))
    })?;
    let colors = get_contrasting_color(&frame, &roi)?;

    Ok(FrameAnalysis {
        frame_size: FrameSize::new(width, height),
        roi,
        colors,
    })
}

/// ROI for `video`, or `None` when the first frame cannot be analyzed.
pub fn find_optimal_roi(tool: &dyn MediaTool, video: &Path, block_size: u32) -> Option<Roi> {
    match analyze_first_frame(tool, video, block_size) {
        Ok(analysis) => Some(analysis.roi),
        Err(e) => {
            tracing::warn!(video = %video.display(), error = %e, "Error finding optimal ROI");
            None
        }
    }
}
