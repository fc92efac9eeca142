//! Caption System Module
//!
//! Turns narration text into on-screen captions:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption System                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs  - Caption entries, words, windows                   │
//! │  timing.rs  - Caption text -> timed words                       │
//! │  font.rs    - Pixel width measurement                           │
//! │  layout.rs  - Greedy window packing inside the ROI              │
//! │  render.rs  - drawtext burn-in (dynamic and static)             │
//! │  formats.rs - SRT export and parsing                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod font;
mod formats;
mod layout;
mod models;
mod render;
mod timing;

pub use font::{
    default_font_candidates, find_font, load_measurer, FixedAdvanceMeasurer, FontMeasurer,
    TextMeasurer, DEFAULT_FONT_FILE,
};
pub use formats::{create_srt_captions, export_srt, format_srt_timestamp, parse_srt, ParseError};
pub use layout::{
    create_caption_windows, effective_width, layout_caption_windows, line_height, LayoutParams,
};
pub use models::{
    CaptionEntry, CaptionLayout, CaptionPosition, CaptionStyle, CaptionWindow, TimedWord, Word,
};
pub use render::{
    create_captions, create_dynamic_captions, create_static_captions, render_dynamic_captions,
    render_static_captions, wrap_text, CaptionRenderOptions, DynamicCaptionOptions,
    StaticCaptionOptions,
};
pub use timing::{split_into_words, DEFAULT_WORDS_PER_SECOND};
