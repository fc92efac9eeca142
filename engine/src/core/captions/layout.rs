//! Caption Window Layout Engine
//!
//! Greedy word packing into the caption ROI. For each run of unplaced words
//! the engine tries font sizes from largest to smallest, simulating line
//! wrapping inside 80% of the ROI width, and commits the words placed at the
//! largest size that fits at least one of them as a window.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::font::TextMeasurer;
use super::models::{CaptionLayout, CaptionWindow, Word};

/// Share of the ROI width usable for text
const EFFECTIVE_WIDTH_RATIO: f64 = 0.8;

/// Line height as a multiple of the font size
const LINE_HEIGHT_RATIO: f64 = 1.2;

/// Line height in pixels for `font_size`
pub fn line_height(font_size: u32) -> u32 {
    (f64::from(font_size) * LINE_HEIGHT_RATIO) as u32
}

/// Width available for text inside a ROI of `roi_width`
pub fn effective_width(roi_width: u32) -> u32 {
    (f64::from(roi_width) * EFFECTIVE_WIDTH_RATIO) as u32
}

/// Font range and ROI box for a layout run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutParams {
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub roi_width: u32,
    pub roi_height: u32,
}

impl LayoutParams {
    pub fn new(min_font_size: u32, max_font_size: u32, roi_width: u32, roi_height: u32) -> Self {
        Self {
            min_font_size,
            max_font_size,
            roi_width,
            roi_height,
        }
    }

    /// Font range with `min <= max` and no zero sizes
    fn font_range(&self) -> (u32, u32) {
        let min = self.min_font_size.max(1);
        let max = self.max_font_size.max(1);
        if min > max {
            warn!(min, max, "Font size range inverted, swapping");
            (max, min)
        } else {
            (min, max)
        }
    }
}

/// Where one word lands during a simulation
#[derive(Debug, Clone, Copy)]
struct Placement {
    x: u32,
    y: u32,
    line: u32,
    font_size: u32,
    width: u32,
}

/// Packs `words` into windows, returning only the windows.
///
/// Words that fit at no size are dropped with a warning; use
/// [`layout_caption_windows`] to inspect them.
pub fn create_caption_windows(
    words: Vec<Word>,
    min_font_size: u32,
    max_font_size: u32,
    roi_width: u32,
    roi_height: u32,
    measurer: &dyn TextMeasurer,
) -> Vec<CaptionWindow> {
    let params = LayoutParams::new(min_font_size, max_font_size, roi_width, roi_height);
    layout_caption_windows(words, &params, measurer).windows
}

/// Packs `words` into windows in reading order.
pub fn layout_caption_windows(
    words: Vec<Word>,
    params: &LayoutParams,
    measurer: &dyn TextMeasurer,
) -> CaptionLayout {
    let (min_size, max_size) = params.font_range();
    let mut remaining: VecDeque<Word> = words.into();
    let mut layout = CaptionLayout::default();
    // Accepted windows lock in their size; only a dropped word restores the max
    let mut current_max = max_size;

    while !remaining.is_empty() {
        let pending: &[Word] = remaining.make_contiguous();

        let fitted = (min_size..=current_max).rev().find_map(|size| {
            let placements = simulate(pending, size, max_size, params, measurer);
            (!placements.is_empty()).then_some((size, placements))
        });

        let Some((font_size, placements)) = fitted else {
            if let Some(word) = remaining.pop_front() {
                warn!(word = %word.text, "Failed to fit word at any font size");
                layout.dropped_words.push(word);
            }
            current_max = max_size;
            continue;
        };
        current_max = font_size;

        let placed: Vec<Word> = remaining
            .drain(..placements.len())
            .zip(placements)
            .map(|(mut word, p)| {
                word.x_position = p.x;
                word.y_position = p.y;
                word.line_number = p.line;
                word.font_size = p.font_size;
                word.width = p.width;
                word
            })
            .collect();

        debug!(font_size, words = placed.len(), "Caption window laid out");
        if let Some(window) = CaptionWindow::from_words(placed, font_size) {
            layout.windows.push(window);
        }
    }

    layout
}

/// Places as many leading `words` as fit at `size`.
///
/// Stops at the first word that fits neither on the current line nor on a
/// new one.
fn simulate(
    words: &[Word],
    size: u32,
    max_size: u32,
    params: &LayoutParams,
    measurer: &dyn TextMeasurer,
) -> Vec<Placement> {
    let max_width = effective_width(params.roi_width);
    let line_h = line_height(size);
    let space = measurer.text_width(" ", size);

    let mut placements: Vec<Placement> = Vec::new();
    let mut cursor_x = 0u32;
    let mut cursor_y = 0u32;
    let mut line = 0u32;

    for (index, word) in words.iter().enumerate() {
        let width = measurer.text_width(&word.text, size);
        let at_line_start = placements.last().map_or(true, |p| p.line != line);
        let gap = if at_line_start { 0 } else { space };

        let fits_row = cursor_x + gap + width <= max_width;
        let fits_height = cursor_y + line_h <= params.roi_height;

        if fits_row && fits_height {
            let x = cursor_x + gap;
            placements.push(Placement {
                x,
                y: cursor_y,
                line,
                font_size: size,
                width,
            });
            cursor_x = x + width;
            continue;
        }

        let room_below = cursor_y + 2 * line_h <= params.roi_height;
        if !at_line_start && room_below && width <= max_width {
            if let Some(previous) = placements.last_mut() {
                grow_to_fill_line(previous, &words[index - 1].text, max_size, max_width, measurer);
            }
            cursor_y += line_h;
            line += 1;
            placements.push(Placement {
                x: 0,
                y: cursor_y,
                line,
                font_size: size,
                width,
            });
            cursor_x = width;
            continue;
        }

        break;
    }

    placements
}

/// Enlarges the word closing a line while it still fits the line width.
fn grow_to_fill_line(
    placement: &mut Placement,
    text: &str,
    max_size: u32,
    max_width: u32,
    measurer: &dyn TextMeasurer,
) {
    for size in placement.font_size + 1..=max_size {
        let width = measurer.text_width(text, size);
        if placement.x + width > max_width {
            break;
        }
        placement.font_size = size;
        placement.width = width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::font::FixedAdvanceMeasurer;
    use std::collections::BTreeMap;

    /// Half-em advance keeps widths exact integers
    fn measurer() -> FixedAdvanceMeasurer {
        FixedAdvanceMeasurer { advance_ratio: 0.5 }
    }

    fn words(text: &str) -> Vec<Word> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| Word::new(w, i as f64 * 0.5, (i + 1) as f64 * 0.5))
            .collect()
    }

    const STORY: &str = "Once upon a time in a quiet village nestled between rolling hills \
        there lived an old clockmaker who repaired every broken watch brought to him";

    // ------------------------------------------------------------------------
    // Coverage and ordering
    // ------------------------------------------------------------------------

    #[test]
    fn test_every_word_placed_exactly_once() {
        let input = words(STORY);
        let layout = layout_caption_windows(
            input.clone(),
            &LayoutParams::new(24, 48, 300, 450),
            &measurer(),
        );

        assert!(layout.dropped_words.is_empty());
        let placed: Vec<&str> = layout
            .windows
            .iter()
            .flat_map(|w| w.words.iter().map(|word| word.text.as_str()))
            .collect();
        let expected: Vec<&str> = input.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(placed, expected);
    }

    #[test]
    fn test_windows_in_time_order_without_overlap() {
        let layout = layout_caption_windows(
            words(STORY),
            &LayoutParams::new(24, 48, 240, 200),
            &measurer(),
        );
        assert!(layout.windows.len() > 1);
        for pair in layout.windows.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
        }
        for window in &layout.windows {
            assert_eq!(window.start_time, window.words[0].start_time);
            assert_eq!(window.end_time, window.words.last().unwrap().end_time);
        }
    }

    // ------------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------------

    #[test]
    fn test_lines_wrap_downward() {
        let layout = layout_caption_windows(
            words(STORY),
            &LayoutParams::new(24, 48, 300, 450),
            &measurer(),
        );

        for window in &layout.windows {
            let mut rows: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
            for word in &window.words {
                let entry = rows.entry(word.line_number).or_insert((u32::MAX, 0));
                entry.0 = entry.0.min(word.y_position);
                entry.1 = entry.1.max(word.y_position);
            }
            let rows: Vec<(u32, u32)> = rows.into_values().collect();
            for pair in rows.windows(2) {
                assert!(pair[1].0 > pair[0].1, "{:?}", rows);
            }
        }
    }

    #[test]
    fn test_words_fit_roi_at_their_size() {
        let params = LayoutParams::new(20, 56, 320, 380);
        let m = measurer();
        let layout = layout_caption_windows(words(STORY), &params, &m);

        let max_width = effective_width(params.roi_width);
        for window in &layout.windows {
            let line_h = line_height(window.font_size);
            for word in &window.words {
                assert_eq!(word.width, m.text_width(&word.text, word.font_size));
                assert!(word.x_position + word.width <= max_width, "{:?}", word);
                assert!(word.y_position + line_h <= params.roi_height, "{:?}", word);
                assert!(word.font_size >= window.font_size);
                assert!(word.font_size <= params.max_font_size);
            }
        }
    }

    #[test]
    fn test_largest_size_is_chosen() {
        // A single short word always fits at the maximum size
        let layout = layout_caption_windows(
            words("Hi"),
            &LayoutParams::new(20, 60, 400, 600),
            &measurer(),
        );
        assert_eq!(layout.windows.len(), 1);
        assert_eq!(layout.windows[0].font_size, 60);
    }

    #[test]
    fn test_font_size_shrinks_for_long_word() {
        // "extraordinary" is 13 chars: 13 * 0.5 * size <= 160 needs size <= 24
        let layout = layout_caption_windows(
            words("extraordinary"),
            &LayoutParams::new(16, 48, 200, 400),
            &measurer(),
        );
        assert_eq!(layout.windows.len(), 1);
        assert_eq!(layout.windows[0].font_size, 24);
    }

    #[test]
    fn test_accepted_size_carries_to_next_window() {
        // "extraordinary" forces size 24; "hi" alone would fit at 40 but
        // starts its window from the size already locked in
        let layout = layout_caption_windows(
            words("extraordinary hi"),
            &LayoutParams::new(16, 40, 200, 50),
            &measurer(),
        );
        let sizes: Vec<u32> = layout.windows.iter().map(|w| w.font_size).collect();
        assert_eq!(sizes, vec![24, 24]);
    }

    #[test]
    fn test_window_sizes_never_grow_without_a_drop() {
        let layout = layout_caption_windows(
            words(STORY),
            &LayoutParams::new(16, 48, 220, 120),
            &measurer(),
        );
        assert!(layout.dropped_words.is_empty());
        assert!(layout.windows.len() > 2);
        for pair in layout.windows.windows(2) {
            assert!(pair[1].font_size <= pair[0].font_size, "{:?}", pair);
        }
    }

    #[test]
    fn test_dropped_word_restores_max_size() {
        let text = format!("extraordinary {} hi", "w".repeat(40));
        let layout = layout_caption_windows(
            words(&text),
            &LayoutParams::new(16, 40, 200, 50),
            &measurer(),
        );
        assert_eq!(layout.dropped_words.len(), 1);
        let sizes: Vec<u32> = layout.windows.iter().map(|w| w.font_size).collect();
        assert_eq!(sizes, vec![24, 40]);
    }

    #[test]
    fn test_line_closing_word_grows() {
        // At size 20: "aa" is 20px wide, space 10px, effective width 80px.
        // "aa aa" fills 50px and "aaaaaaa" (70px) wraps to the next line.
        let layout = layout_caption_windows(
            words("aa aa aaaaaaa"),
            &LayoutParams::new(20, 20, 100, 200),
            &measurer(),
        );
        assert_eq!(layout.windows.len(), 1);
        let window = &layout.windows[0];
        assert_eq!(window.font_size, 20);
        assert_eq!(window.words[1].line_number, 0);
        assert_eq!(window.words[2].line_number, 1);
        // Max size equals the window size, nothing can grow
        assert_eq!(window.words[1].font_size, 20);

        // At most size 20 for "abcdefgh" (4 * size <= 80). The lone "x" on
        // the middle line closes it and grows to the 40 maximum.
        let grown = layout_caption_windows(
            words("abcdefgh x abcdefgh"),
            &LayoutParams::new(10, 40, 100, 200),
            &measurer(),
        );
        assert_eq!(grown.windows.len(), 1);
        let window = &grown.windows[0];
        assert_eq!(window.font_size, 20);
        assert_eq!(window.words[1].line_number, 1);
        assert_eq!(window.words[1].font_size, 40);
        assert_eq!(window.words[1].width, 20);
        assert_eq!(window.words[2].line_number, 2);
        assert_eq!(window.words[0].font_size, 20);
    }

    #[test]
    fn test_previous_word_growth_stays_on_line() {
        let params = LayoutParams::new(10, 40, 200, 100);
        let m = measurer();
        let layout = layout_caption_windows(words("ab cd efghijklmnop qr"), &params, &m);
        let max_width = effective_width(params.roi_width);
        for window in &layout.windows {
            for word in &window.words {
                if word.font_size > window.font_size {
                    assert!(word.x_position + word.width <= max_width);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Degenerate input
    // ------------------------------------------------------------------------

    #[test]
    fn test_unfittable_word_is_dropped() {
        // 40 chars at the minimum size 10 is 200px, wider than 0.8 * 100
        let text = format!("ok {} fine", "w".repeat(40));
        let layout = layout_caption_windows(
            words(&text),
            &LayoutParams::new(10, 20, 100, 100),
            &measurer(),
        );

        assert_eq!(layout.dropped_words.len(), 1);
        assert_eq!(layout.dropped_words[0].text.len(), 40);
        assert_eq!(layout.placed_word_count(), 2);
        // Next word restarts at the maximum size
        let last = layout.windows.last().unwrap();
        assert_eq!(last.words[0].text, "fine");
        assert_eq!(last.font_size, 20);
    }

    #[test]
    fn test_zero_sized_roi_drops_everything() {
        let layout = layout_caption_windows(
            words("nothing fits here"),
            &LayoutParams::new(10, 20, 0, 0),
            &measurer(),
        );
        assert!(layout.windows.is_empty());
        assert_eq!(layout.dropped_words.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        let windows = create_caption_windows(Vec::new(), 32, 48, 300, 400, &measurer());
        assert!(windows.is_empty());
    }

    #[test]
    fn test_inverted_font_range_is_tolerated() {
        let windows = create_caption_windows(words("hello world"), 48, 32, 300, 400, &measurer());
        assert!(!windows.is_empty());
        assert!(windows.iter().all(|w| (32..=48).contains(&w.font_size)));
    }
}
