//! Caption Region of Interest
//!
//! Finds the calmest portrait-shaped area of a frame, measured as the mean
//! per-block standard deviation of grayscale intensity.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::core::FrameSize;

/// Default analysis block edge in pixels
pub const DEFAULT_BLOCK_SIZE: u32 = 32;

/// Fraction cut from every side before analysis
const BUFFER_RATIO: f64 = 0.05;

/// Fraction of the buffered frame kept clear around the ROI
const BORDER_RATIO: f64 = 0.1;

/// ROI area as a fraction of the buffered, bordered area
const TARGET_AREA_DIVISOR: f64 = 7.0;

/// Height-to-width ratio of the ROI
const PORTRAIT_RATIO: f64 = 1.5;

/// Pixel rectangle in frame coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Exclusive right edge
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    /// True when the rectangle is non-empty and lies inside `frame`.
    pub fn fits_within(&self, frame: FrameSize) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= u64::from(frame.width)
            && self.bottom() <= u64::from(frame.height)
    }
}

// =============================================================================
// Activity Map
// =============================================================================

/// Per-block activity scores over a rectangular region of a frame
#[derive(Debug, Clone)]
pub struct ActivityMap {
    blocks_wide: usize,
    blocks_high: usize,
    scores: Vec<f64>,
}

impl ActivityMap {
    /// Scores every whole `block_size` block of the `region` rectangle.
    ///
    /// Partial blocks at the right/bottom edges are ignored.
    pub fn compute(frame: &RgbImage, region: Roi, block_size: u32) -> Self {
        let block_size = block_size.max(1);
        let blocks_wide = (region.width / block_size) as usize;
        let blocks_high = (region.height / block_size) as usize;

        let mut scores = Vec::with_capacity(blocks_wide * blocks_high);
        for by in 0..blocks_high as u32 {
            for bx in 0..blocks_wide as u32 {
                let x0 = region.x + bx * block_size;
                let y0 = region.y + by * block_size;
                scores.push(block_std_dev(frame, x0, y0, block_size));
            }
        }

        Self {
            blocks_wide,
            blocks_high,
            scores,
        }
    }

    pub fn blocks_wide(&self) -> usize {
        self.blocks_wide
    }

    pub fn blocks_high(&self) -> usize {
        self.blocks_high
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, bx: usize, by: usize) -> Option<f64> {
        if bx >= self.blocks_wide || by >= self.blocks_high {
            return None;
        }
        self.scores.get(by * self.blocks_wide + bx).copied()
    }

    /// Mean score over a block window, or `None` if it leaves the map.
    pub fn window_mean(&self, bx: usize, by: usize, wide: usize, high: usize) -> Option<f64> {
        if wide == 0 || high == 0 || bx + wide > self.blocks_wide || by + high > self.blocks_high
        {
            return None;
        }

        let total: f64 = (by..by + high)
            .flat_map(|row| {
                let start = row * self.blocks_wide + bx;
                self.scores[start..start + wide].iter().copied()
            })
            .sum();
        Some(total / (wide * high) as f64)
    }
}

/// Population standard deviation of grayscale (channel mean) intensity
fn block_std_dev(frame: &RgbImage, x0: u32, y0: u32, size: u32) -> f64 {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in y0..y0 + size {
        for x in x0..x0 + size {
            let [r, g, b] = frame.get_pixel(x, y).0;
            let gray = (f64::from(r) + f64::from(g) + f64::from(b)) / 3.0;
            sum += gray;
            sum_sq += gray * gray;
        }
    }
    let n = f64::from(size) * f64::from(size);
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0).sqrt()
}

// =============================================================================
// ROI Search
// =============================================================================

/// Finds the lowest-activity portrait ROI in `frame`.
///
/// Returns `None` only when the frame cannot be analyzed at all (zero-sized
/// frame or zero block size).
pub fn find_roi_in_frame(frame: &RgbImage, block_size: u32) -> Option<Roi> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 || block_size == 0 {
        return None;
    }

    let buffer_x = (f64::from(width) * BUFFER_RATIO) as u32;
    let buffer_y = (f64::from(height) * BUFFER_RATIO) as u32;
    let crop = Roi::new(
        buffer_x,
        buffer_y,
        width - 2 * buffer_x,
        height - 2 * buffer_y,
    );

    if crop.width < block_size || crop.height < block_size {
        return Some(Roi::new(0, 0, width, height));
    }

    let border_x = (f64::from(crop.width) * BORDER_RATIO) as u32;
    let border_y = (f64::from(crop.height) * BORDER_RATIO) as u32;
    let inner_w = crop.width - 2 * border_x;
    let inner_h = crop.height - 2 * border_y;

    let target_area = f64::from(inner_w) * f64::from(inner_h) / TARGET_AREA_DIVISOR;
    let roi_w = ((target_area / PORTRAIT_RATIO).sqrt() as u32).min(inner_w).max(1);
    let roi_h = ((f64::from(roi_w) * PORTRAIT_RATIO) as u32).min(inner_h).max(1);

    let activity = ActivityMap::compute(frame, crop, block_size);
    let wide = (roi_w / block_size).max(1) as usize;
    let high = (roi_h / block_size).max(1) as usize;

    // Slide range keeps a full border on the far side as well.
    let last_x = crop.width.saturating_sub(roi_w + 2 * border_x);
    let last_y = crop.height.saturating_sub(roi_h + 2 * border_y);

    let mut best = (border_x, border_y);
    let mut best_score = f64::INFINITY;

    for y in (border_y..=last_y).step_by(block_size as usize) {
        for x in (border_x..=last_x).step_by(block_size as usize) {
            let bx = (x / block_size) as usize;
            let by = (y / block_size) as usize;
            let Some(score) = activity.window_mean(bx, by, wide, high) else {
                continue;
            };
            if score < best_score {
                best_score = score;
                best = (x, y);
            }
        }
    }

    tracing::debug!(
        x = best.0 + buffer_x,
        y = best.1 + buffer_y,
        width = roi_w,
        height = roi_h,
        activity = best_score,
        "Selected caption ROI"
    );

    Some(Roi::new(best.0 + buffer_x, best.1 + buffer_y, roi_w, roi_h))
}
