//! Caption Data Models
//!
//! Words, caption entries and the windows the layout engine groups them into.

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

// =============================================================================
// Caption Entry
// =============================================================================

/// Externally aligned word: `(text, start, end)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    pub text: String,
    pub start: TimeSec,
    pub end: TimeSec,
}

impl TimedWord {
    pub fn new(text: impl Into<String>, start: TimeSec, end: TimeSec) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// One semantic caption unit, typically one narrated story line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub text: String,
    pub start_time: TimeSec,
    /// `f64::INFINITY` (or omitted in JSON) means "until the end of the clip"
    #[serde(default = "open_end")]
    pub end_time: TimeSec,
    /// Authoritative per-word timings when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_words: Option<Vec<TimedWord>>,
}

fn open_end() -> TimeSec {
    TimeSec::INFINITY
}

impl CaptionEntry {
    pub fn new(text: impl Into<String>, start_time: TimeSec, end_time: TimeSec) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            timed_words: None,
        }
    }

    /// Caption displayed for the rest of the clip
    pub fn open_ended(text: impl Into<String>, start_time: TimeSec) -> Self {
        Self::new(text, start_time, open_end())
    }

    pub fn with_timed_words(mut self, timed_words: Vec<TimedWord>) -> Self {
        self.timed_words = Some(timed_words);
        self
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_time.is_infinite()
    }

    pub fn duration(&self) -> TimeSec {
        self.end_time - self.start_time
    }
}

// =============================================================================
// Word
// =============================================================================

/// One token to render, with layout results filled in by the window engine
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Word {
    pub text: String,
    pub start_time: TimeSec,
    pub end_time: TimeSec,
    /// 0-based line within the word's window
    pub line_number: u32,
    pub font_size: u32,
    /// Left edge relative to the ROI
    pub x_position: u32,
    /// Top of the word's line relative to the ROI
    pub y_position: u32,
    /// Measured width at `font_size`
    pub width: u32,
}

impl Word {
    pub fn new(text: impl Into<String>, start_time: TimeSec, end_time: TimeSec) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            line_number: 0,
            font_size: 0,
            x_position: 0,
            y_position: 0,
            width: 0,
        }
    }
}

// =============================================================================
// Caption Window
// =============================================================================

/// Words displayed together, sharing one font size
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaptionWindow {
    pub words: Vec<Word>,
    pub start_time: TimeSec,
    pub end_time: TimeSec,
    pub font_size: u32,
}

impl CaptionWindow {
    /// Builds a window spanning its first word's start to its last word's end.
    ///
    /// Returns `None` for an empty word list.
    pub fn from_words(words: Vec<Word>, font_size: u32) -> Option<Self> {
        let start_time = words.first()?.start_time;
        let end_time = words.last()?.end_time;
        Some(Self {
            words,
            start_time,
            end_time,
            font_size,
        })
    }

    pub fn line_count(&self) -> u32 {
        self.words
            .iter()
            .map(|w| w.line_number + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Output of the layout engine
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CaptionLayout {
    pub windows: Vec<CaptionWindow>,
    /// Words that fit at no allowed font size
    pub dropped_words: Vec<Word>,
}

impl CaptionLayout {
    pub fn placed_word_count(&self) -> usize {
        self.windows.iter().map(|w| w.words.len()).sum()
    }
}

// =============================================================================
// Rendering Options
// =============================================================================

/// Vertical anchor for static captions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    #[default]
    Bottom,
    Center,
}

/// Caption rendering mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    #[default]
    Static,
    Dynamic,
}

impl std::str::FromStr for CaptionStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!(
                "Invalid caption style '{}': expected 'static' or 'dynamic'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_entry_open_end_from_json() {
        let entry: CaptionEntry =
            serde_json::from_str(r#"{"text": "Once upon a time", "start_time": 1.5}"#).unwrap();
        assert!(entry.is_open_ended());
        assert!(entry.timed_words.is_none());

        let timed: CaptionEntry = serde_json::from_str(
            r#"{"text": "Hi there", "start_time": 0.0, "end_time": 1.0,
                "timed_words": [{"text": "Hi", "start": 0.0, "end": 0.4},
                                {"text": "there", "start": 0.4, "end": 1.0}]}"#,
        )
        .unwrap();
        assert_eq!(timed.timed_words.unwrap().len(), 2);
        assert!((timed.end_time - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_window_from_words() {
        let mut second = Word::new("world", 0.5, 1.25);
        second.line_number = 1;
        let window =
            CaptionWindow::from_words(vec![Word::new("hello", 0.0, 0.5), second], 40).unwrap();
        assert_eq!(window.start_time, 0.0);
        assert_eq!(window.end_time, 1.25);
        assert_eq!(window.line_count(), 2);

        assert!(CaptionWindow::from_words(Vec::new(), 40).is_none());
    }

    #[test]
    fn test_caption_style_from_str() {
        assert_eq!("Dynamic".parse::<CaptionStyle>(), Ok(CaptionStyle::Dynamic));
        assert_eq!(" static ".parse::<CaptionStyle>(), Ok(CaptionStyle::Static));
        assert!("fancy".parse::<CaptionStyle>().is_err());
    }
}
