//! SRT Subtitle Export and Parsing
//!
//! Side-car subtitles for the captioned video.
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,500
//! First caption text
//!
//! 2
//! 00:00:02,500 --> 00:00:05,000
//! Second caption text
//! ```

use std::path::{Path, PathBuf};

use super::models::CaptionEntry;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during SRT parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

// =============================================================================
// Export
// =============================================================================

/// Renders captions as SRT text.
///
/// Open-ended captions are written with their start time as the end.
pub fn export_srt(captions: &[CaptionEntry]) -> String {
    let mut output = String::new();

    for (index, caption) in captions.iter().enumerate() {
        let end = if caption.end_time.is_finite() {
            caption.end_time
        } else {
            caption.start_time
        };

        output.push_str(&format!("{}\n", index + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(caption.start_time),
            format_srt_timestamp(end)
        ));
        output.push_str(caption.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Formats seconds as an SRT timestamp (00:00:00,000)
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Writes an SRT file for `captions`.
///
/// Without an `output_path` the file goes to a uniquely named file in the
/// system temp directory. Returns `None` when the file cannot be written.
pub fn create_srt_captions(captions: &[CaptionEntry], output_path: Option<&Path>) -> Option<PathBuf> {
    let path = match output_path {
        Some(path) => path.to_path_buf(),
        None => std::env::temp_dir().join(format!("captions_{}.srt", uuid::Uuid::new_v4())),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!(path = %path.display(), error = %e, "Error creating SRT directory");
            return None;
        }
    }

    match std::fs::write(&path, export_srt(captions)) {
        Ok(()) => {
            tracing::info!(path = %path.display(), count = captions.len(), "Wrote SRT captions");
            Some(path)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Error creating SRT file");
            None
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses SRT content back into caption entries
pub fn parse_srt(content: &str) -> Result<Vec<CaptionEntry>, ParseError> {
    let mut captions = Vec::new();
    let mut lines = content.lines().peekable();

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        if lines.peek().is_none() {
            break;
        }

        let sequence = lines.next().ok_or(ParseError::UnexpectedEnd)?;
        if sequence.trim().parse::<u32>().is_err() {
            return Err(ParseError::InvalidFormat(format!(
                "Expected sequence number: {}",
                sequence
            )));
        }

        let timestamp_line = lines.next().ok_or(ParseError::UnexpectedEnd)?;
        let (start, end) = parse_srt_timestamp_line(timestamp_line)?;

        let mut text_lines = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(line);
        }
        if text_lines.is_empty() {
            return Err(ParseError::MissingData("Caption text".to_string()));
        }

        captions.push(CaptionEntry::new(text_lines.join("\n"), start, end));
    }

    Ok(captions)
}

/// Parses an SRT timestamp line (e.g., "00:00:01,000 --> 00:00:04,000")
fn parse_srt_timestamp_line(line: &str) -> Result<(f64, f64), ParseError> {
    let (start, end) = line.split_once("-->").ok_or_else(|| {
        ParseError::InvalidFormat(format!("Expected 'start --> end' format: {}", line))
    })?;
    Ok((parse_srt_timestamp(start.trim())?, parse_srt_timestamp(end.trim())?))
}

/// Parses an SRT timestamp (e.g., "00:01:23,456") into seconds
fn parse_srt_timestamp(ts: &str) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidTimestamp(ts.to_string());

    let normalized = ts.replace(',', ".");
    let mut parts = normalized.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let hours: f64 = h.parse().map_err(|_| invalid())?;
    let minutes: f64 = m.parse().map_err(|_| invalid())?;
    let seconds: f64 = s.parse().map_err(|_| invalid())?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}
