//! Word Timing
//!
//! Turns a caption entry into timed words, either from aligned timestamps or
//! by pacing the text at a fixed reading rate.

use super::models::{CaptionEntry, Word};

/// Default reading pace for captions without aligned timings
pub const DEFAULT_WORDS_PER_SECOND: f64 = 2.0;

/// Splits a caption into timed words.
///
/// Aligned `timed_words` win when present; they are clamped so each word
/// starts no earlier than the previous one ends. Otherwise words are paced at
/// `words_per_second`, compressed evenly when the caption is too short, and
/// the last word always ends exactly at the caption end.
pub fn split_into_words(caption: &CaptionEntry, words_per_second: f64) -> Vec<Word> {
    if let Some(timed_words) = caption.timed_words.as_deref().filter(|t| !t.is_empty()) {
        let mut previous_end = f64::NEG_INFINITY;
        return timed_words
            .iter()
            .filter(|t| !t.text.trim().is_empty())
            .map(|t| {
                let start = t.start.max(previous_end);
                let end = t.end.max(start);
                previous_end = end;
                Word::new(t.text.trim(), start, end)
            })
            .collect();
    }

    let tokens: Vec<&str> = caption.text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let words_per_second = if words_per_second.is_finite() && words_per_second > 0.0 {
        words_per_second
    } else {
        tracing::warn!(words_per_second, "Invalid reading pace, using default");
        DEFAULT_WORDS_PER_SECOND
    };

    let start = caption.start_time;
    let count = tokens.len() as f64;
    let paced = 1.0 / words_per_second;

    let (end, word_duration) = if caption.is_open_ended() {
        (start + paced * count, paced)
    } else {
        let end = caption.end_time.max(start);
        let duration = end - start;
        if count / words_per_second > duration {
            (end, duration / count)
        } else {
            (end, paced)
        }
    };

    let last = tokens.len() - 1;
    let mut current = start;
    tokens
        .into_iter()
        .enumerate()
        .map(|(i, token)| {
            let word_end = if i == last {
                end
            } else {
                (current + word_duration).min(end)
            };
            let word = Word::new(token, current, word_end);
            current = word_end;
            word
        })
        .collect()
}
