//! Drawtext Filter Construction
//!
//! Caption overlays are expressed as chains of `drawtext` filters written to a
//! filter script. Values pass through two escaping levels: the filter option
//! level (`\ ' :`) and the filtergraph level (`\ ' [ ] , ;`).

use std::path::{Path, PathBuf};

use crate::core::TimeSec;

/// Escapes a value for use inside a single filter option.
pub fn escape_option_value(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escapes an already option-escaped value for the filtergraph parser.
pub fn escape_graph(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Both escaping levels, in the order ffmpeg unwinds them
pub fn filter_value(raw: &str) -> String {
    escape_graph(&escape_option_value(raw))
}

fn path_value(path: &Path) -> String {
    filter_value(&path.to_string_lossy())
}

/// `between(t,start,end)`; an open end keeps the text until the clip ends.
pub fn enable_between(start: TimeSec, end: TimeSec) -> String {
    if end.is_finite() {
        format!("between(t,{:.3},{:.3})", start, end)
    } else {
        format!("gte(t,{:.3})", start)
    }
}

/// A single `drawtext` filter.
///
/// Text is always read from `textfile` with expansion disabled so caption
/// content is never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    pub textfile: PathBuf,
    pub fontfile: Option<PathBuf>,
    pub font_size: u32,
    pub font_color: String,
    /// Expression or pixel offset
    pub x: String,
    pub y: String,
    pub border: Option<(u32, String)>,
    pub box_color: Option<String>,
    pub box_border: u32,
    pub enable: Option<String>,
}

impl DrawText {
    pub fn new(textfile: impl Into<PathBuf>, font_size: u32, font_color: impl Into<String>) -> Self {
        Self {
            textfile: textfile.into(),
            fontfile: None,
            font_size,
            font_color: font_color.into(),
            x: "0".to_string(),
            y: "0".to_string(),
            border: None,
            box_color: None,
            box_border: 0,
            enable: None,
        }
    }

    pub fn fontfile(mut self, fontfile: Option<&Path>) -> Self {
        self.fontfile = fontfile.map(Path::to_path_buf);
        self
    }

    pub fn position(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x = x.into();
        self.y = y.into();
        self
    }

    pub fn border(mut self, width: u32, color: impl Into<String>) -> Self {
        self.border = Some((width, color.into()));
        self
    }

    pub fn boxed(mut self, color: impl Into<String>, padding: u32) -> Self {
        self.box_color = Some(color.into());
        self.box_border = padding;
        self
    }

    pub fn enable(mut self, expression: impl Into<String>) -> Self {
        self.enable = Some(expression.into());
        self
    }

    /// Renders the filter as it appears in a filter script
    pub fn to_filter_string(&self) -> String {
        let mut options = Vec::with_capacity(12);

        if let Some(fontfile) = &self.fontfile {
            options.push(format!("fontfile={}", path_value(fontfile)));
        }
        options.push(format!("textfile={}", path_value(&self.textfile)));
        options.push("expansion=none".to_string());
        options.push(format!("fontsize={}", self.font_size));
        options.push(format!("fontcolor={}", filter_value(&self.font_color)));
        options.push(format!("x={}", filter_value(&self.x)));
        options.push(format!("y={}", filter_value(&self.y)));

        if let Some((width, color)) = &self.border {
            options.push(format!("borderw={}", width));
            options.push(format!("bordercolor={}", filter_value(color)));
        }
        if let Some(color) = &self.box_color {
            options.push("box=1".to_string());
            options.push(format!("boxcolor={}", filter_value(color)));
            options.push(format!("boxborderw={}", self.box_border));
        }
        if let Some(enable) = &self.enable {
            options.push(format!("enable={}", filter_value(enable)));
        }

        format!("drawtext={}", options.join(":"))
    }
}

/// Joins drawtext filters into a linear filter script
pub fn filter_script(filters: &[DrawText]) -> String {
    filters
        .iter()
        .map(DrawText::to_filter_string)
        .collect::<Vec<_>>()
        .join(",\n")
}
