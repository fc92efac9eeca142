//! StoryReel Core Type Definitions
//!
//! Defines fundamental types shared across the analysis, caption and render modules.

use serde::{Deserialize, Serialize};

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

// =============================================================================
// Color Types
// =============================================================================

/// 8-bit RGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Divides every channel by `divisor` (integer division).
    pub fn scaled_down(self, divisor: u8) -> Self {
        let divisor = divisor.max(1);
        Self::new(self.r / divisor, self.g / divisor, self.b / divisor)
    }

    /// Perceived luminance on the 0-255 scale (ITU-R BT.601 weights).
    pub fn luminance(self) -> f64 {
        0.299 * f64::from(self.r) + 0.587 * f64::from(self.g) + 0.114 * f64::from(self.b)
    }

    /// FFmpeg color literal (`0xRRGGBB`), optionally with `@alpha`.
    pub fn to_ffmpeg(self, alpha: Option<f64>) -> String {
        let base = format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b);
        match alpha {
            Some(a) => format!("{}@{:.2}", base, a.clamp(0.0, 1.0)),
            None => base,
        }
    }
}

// =============================================================================
// Geometry Types
// =============================================================================

/// Frame dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
