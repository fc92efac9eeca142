//! Text Measurement
//!
//! Layout needs exact pixel widths. [`FontMeasurer`] reads real glyph
//! advances through `fontdue`; [`FixedAdvanceMeasurer`] is a deterministic
//! stand-in used when no font file is available.

use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};

use crate::core::{CoreError, CoreResult};

/// File name searched for when no font is configured
pub const DEFAULT_FONT_FILE: &str = "DejaVuSans.ttf";

/// Measures rendered text width in pixels
pub trait TextMeasurer: Send + Sync {
    /// Width of `text` at `font_size` pixels, rounded up
    fn text_width(&self, text: &str, font_size: u32) -> u32;
}

// =============================================================================
// Font-backed measurement
// =============================================================================

/// Glyph-advance measurement from a TrueType/OpenType font
pub struct FontMeasurer {
    font: Font,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for FontMeasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMeasurer")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FontMeasurer {
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CoreError::FontError(e.to_string()))?;
        Ok(Self { font, path: None })
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            CoreError::FontError(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        let mut measurer = Self::from_bytes(&bytes)?;
        measurer.path = Some(path.to_path_buf());
        Ok(measurer)
    }

    /// Font file this measurer was loaded from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl TextMeasurer for FontMeasurer {
    fn text_width(&self, text: &str, font_size: u32) -> u32 {
        let px = font_size as f32;
        let mut width = 0.0f32;
        let mut previous: Option<char> = None;

        for c in text.chars() {
            if let Some(prev) = previous {
                width += self.font.horizontal_kern(prev, c, px).unwrap_or(0.0);
            }
            width += self.font.metrics(c, px).advance_width;
            previous = Some(c);
        }

        width.max(0.0).ceil() as u32
    }
}

// =============================================================================
// Fixed-advance measurement
// =============================================================================

/// Every character advances by `advance_ratio * font_size`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvanceMeasurer {
    pub advance_ratio: f64,
}

impl Default for FixedAdvanceMeasurer {
    fn default() -> Self {
        // Average advance of a sans-serif Latin face
        Self { advance_ratio: 0.6 }
    }
}

impl TextMeasurer for FixedAdvanceMeasurer {
    fn text_width(&self, text: &str, font_size: u32) -> u32 {
        let chars = text.chars().count() as f64;
        (chars * f64::from(font_size) * self.advance_ratio).ceil() as u32
    }
}

// =============================================================================
// Font discovery
// =============================================================================

/// Candidate locations of the default caption font, in search order
pub fn default_font_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/usr/share/fonts/truetype/dejavu").join(DEFAULT_FONT_FILE),
        PathBuf::from("/usr/share/fonts/TTF").join(DEFAULT_FONT_FILE),
        PathBuf::from("/usr/share/fonts/dejavu").join(DEFAULT_FONT_FILE),
        PathBuf::from("/Library/Fonts").join(DEFAULT_FONT_FILE),
    ];
    if let Some(user_fonts) = dirs::font_dir() {
        candidates.push(user_fonts.join(DEFAULT_FONT_FILE));
    }
    candidates
}

/// Configured font if it exists, otherwise the first default candidate found.
pub fn find_font(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(font = %path.display(), "Configured font not found, searching defaults");
    }
    default_font_candidates().into_iter().find(|p| p.exists())
}

/// Measurer for caption layout plus the font file ffmpeg should draw with.
///
/// Falls back to [`FixedAdvanceMeasurer`] (and no font file) when no usable
/// font can be loaded.
pub fn load_measurer(configured: Option<&Path>) -> (Box<dyn TextMeasurer>, Option<PathBuf>) {
    if let Some(path) = find_font(configured) {
        match FontMeasurer::from_file(&path) {
            Ok(measurer) => return (Box::new(measurer), Some(path)),
            Err(e) => tracing::warn!(error = %e, "Falling back to estimated text widths"),
        }
    } else {
        tracing::warn!("No caption font found, falling back to estimated text widths");
    }
    (Box::new(FixedAdvanceMeasurer::default()), None)
}
