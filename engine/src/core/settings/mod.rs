//! Configuration
//!
//! Two documents drive a run:
//! - [`PipelineConfig`]: tool paths and rendering knobs. Tolerant: bad values
//!   are clamped or reset instead of failing.
//! - [`StoryConfig`]: the story to produce. Strict: missing or conflicting
//!   fields are rejected.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::analysis::DEFAULT_BLOCK_SIZE;
use crate::core::captions::{
    CaptionPosition, CaptionRenderOptions, CaptionStyle, DynamicCaptionOptions,
    StaticCaptionOptions, DEFAULT_WORDS_PER_SECOND,
};
use crate::core::render::DEFAULT_MUSIC_VOLUME;
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Pipeline Config
// =============================================================================

/// Rendering pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub ffmpeg: FFmpegSettings,
    pub captions: CaptionSettings,
    pub encoding: EncodingSettings,
    pub background_music_volume: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: FFmpegSettings::default(),
            captions: CaptionSettings::default(),
            encoding: EncodingSettings::default(),
            background_music_volume: DEFAULT_MUSIC_VOLUME,
        }
    }
}

/// Binary locations and environment overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FFmpegSettings {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Forces CI or production thread budgets; `None` detects from the env
    pub ci_mode: Option<bool>,
}

/// Caption rendering settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptionSettings {
    pub style: CaptionStyle,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub static_font_size: u32,
    pub words_per_second: f64,
    pub font_path: Option<PathBuf>,
    pub roi_block_size: u32,
    pub shadow_offset: (i32, i32),
    pub border_thickness: u32,
    pub position: CaptionPosition,
    pub margin: u32,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        let dynamic = DynamicCaptionOptions::default();
        let fixed = StaticCaptionOptions::default();
        Self {
            style: CaptionStyle::default(),
            min_font_size: dynamic.min_font_size,
            max_font_size: dynamic.max_font_size,
            static_font_size: fixed.font_size,
            words_per_second: DEFAULT_WORDS_PER_SECOND,
            font_path: None,
            roi_block_size: DEFAULT_BLOCK_SIZE,
            shadow_offset: dynamic.shadow_offset,
            border_thickness: dynamic.border_thickness,
            position: fixed.position,
            margin: fixed.margin,
        }
    }
}

/// Encoder worker settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncodingSettings {
    /// Parallel encode workers; `None` uses all cores but one
    pub threads: Option<usize>,
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

impl PipelineConfig {
    /// Clamps out-of-range values so any parsed config is usable.
    pub fn normalize(&mut self) {
        let captions = &mut self.captions;
        captions.min_font_size = captions.min_font_size.clamp(8, 256);
        captions.max_font_size = captions.max_font_size.clamp(captions.min_font_size, 256);
        captions.static_font_size = captions.static_font_size.clamp(8, 256);
        if !captions.words_per_second.is_finite() || captions.words_per_second <= 0.0 {
            captions.words_per_second = DEFAULT_WORDS_PER_SECOND;
        }
        captions.words_per_second = captions.words_per_second.min(20.0);
        captions.roi_block_size = captions.roi_block_size.clamp(1, 512);
        captions.shadow_offset = (
            captions.shadow_offset.0.clamp(-64, 64),
            captions.shadow_offset.1.clamp(-64, 64),
        );
        captions.border_thickness = captions.border_thickness.min(32);
        captions.margin = captions.margin.min(1000);

        // 0 means "auto".
        if self.encoding.threads == Some(0) {
            self.encoding.threads = None;
        }
        self.encoding.threads = self.encoding.threads.map(|t| t.min(256));

        self.background_music_volume = clamp_f64(self.background_music_volume, 0.0, 1.0);
    }

    /// Reads a JSON config and normalizes it.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&content).map_err(|e| {
            CoreError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        config.normalize();
        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Loads `path` when given, otherwise defaults. Unreadable files fall back
    /// to defaults with a warning.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Writes the normalized config with an atomic temp file + rename.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let mut normalized = self.clone();
        normalized.normalize();
        let json = serde_json::to_string_pretty(&normalized)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        info!(path = %path.display(), "Saved pipeline config");
        Ok(())
    }

    /// Renderer options with `style` overriding the configured style.
    pub fn caption_options(&self, style: Option<CaptionStyle>) -> CaptionRenderOptions {
        let c = &self.captions;
        CaptionRenderOptions {
            style: style.unwrap_or(c.style),
            dynamic: DynamicCaptionOptions {
                min_font_size: c.min_font_size,
                max_font_size: c.max_font_size,
                words_per_second: c.words_per_second,
                font_path: c.font_path.clone(),
                roi_block_size: c.roi_block_size,
                shadow_offset: c.shadow_offset,
                border_thickness: c.border_thickness,
            },
            static_captions: StaticCaptionOptions {
                font_size: c.static_font_size,
                font_path: c.font_path.clone(),
                position: c.position,
                margin: c.margin,
                ..StaticCaptionOptions::default()
            },
        }
    }
}

// =============================================================================
// Story Config
// =============================================================================

/// A file on disk or a generation prompt, never both
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MusicSource {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl MusicSource {
    pub fn validate(&self) -> CoreResult<()> {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        match (has(&self.file), has(&self.prompt)) {
            (false, false) => Err(CoreError::ValidationError(
                "Either file or prompt must be specified".to_string(),
            )),
            (true, true) => Err(CoreError::ValidationError(
                "Cannot specify both file and prompt".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosingCreditsConfig {
    pub music: MusicSource,
    pub poster: MusicSource,
}

/// Story to turn into a video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryConfig {
    pub style: String,
    pub story: Vec<String>,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_caption_style")]
    pub caption_style: CaptionStyle,
    #[serde(default)]
    pub background_music: Option<MusicSource>,
    #[serde(default)]
    pub closing_credits: Option<ClosingCreditsConfig>,
}

/// Accepts `null` as the default style and reports unknown styles by name.
fn deserialize_caption_style<'de, D>(deserializer: D) -> Result<CaptionStyle, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value {
        None => Ok(CaptionStyle::default()),
        Some(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl StoryConfig {
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| CoreError::ConfigError(format!("Invalid story config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!("Failed to read story {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            title = %config.title,
            lines = config.story.len(),
            "Loaded story config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if let Some(music) = &self.background_music {
            music.validate()?;
        }
        if let Some(credits) = &self.closing_credits {
            credits.music.validate()?;
            credits.poster.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // PipelineConfig
    // ------------------------------------------------------------------------

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.captions.style, CaptionStyle::Static);
        assert_eq!(config.captions.min_font_size, 32);
        assert_eq!(config.captions.max_font_size, 48);
        assert_eq!(config.captions.static_font_size, 40);
        assert!((config.background_music_volume - 0.3).abs() < 1e-9);
        assert!(config.encoding.threads.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"captions":{"style":"dynamic"}}"#).unwrap();
        assert_eq!(config.captions.style, CaptionStyle::Dynamic);
        assert_eq!(config.captions.roi_block_size, 32);
        assert!((config.background_music_volume - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_clamps_bad_values() {
        let mut config = PipelineConfig::default();
        config.captions.min_font_size = 60;
        config.captions.max_font_size = 20;
        config.captions.words_per_second = f64::NAN;
        config.captions.roi_block_size = 0;
        config.encoding.threads = Some(0);
        config.background_music_volume = 4.0;

        config.normalize();
        assert_eq!(config.captions.max_font_size, 60);
        assert_eq!(config.captions.words_per_second, DEFAULT_WORDS_PER_SECOND);
        assert_eq!(config.captions.roi_block_size, 1);
        assert!(config.encoding.threads.is_none());
        assert_eq!(config.background_music_volume, 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.json");
        let mut config = PipelineConfig::default();
        config.captions.style = CaptionStyle::Dynamic;
        config.encoding.threads = Some(3);

        config.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(PipelineConfig::load(&path), Err(CoreError::ConfigError(_))));
        assert_eq!(PipelineConfig::load_or_default(Some(&path)), PipelineConfig::default());
    }

    #[test]
    fn test_caption_options() {
        let mut config = PipelineConfig::default();
        config.captions.font_path = Some(PathBuf::from("/fonts/a.ttf"));
        config.captions.margin = 12;

        let options = config.caption_options(Some(CaptionStyle::Dynamic));
        assert_eq!(options.style, CaptionStyle::Dynamic);
        assert_eq!(options.dynamic.font_path, config.captions.font_path);
        assert_eq!(options.static_captions.margin, 12);
        assert_eq!(options.static_captions.box_color, "black@0.5");
        assert_eq!(config.caption_options(None).style, CaptionStyle::Static);
    }

    // ------------------------------------------------------------------------
    // StoryConfig
    // ------------------------------------------------------------------------

    const STORY: &str = r#"{
        "style": "digital art",
        "story": ["A cat wakes.", "It explores.", "It sleeps."],
        "title": "The Curious Cat"
    }"#;

    #[test]
    fn test_minimal_story() {
        let config = StoryConfig::from_json(STORY).unwrap();
        assert_eq!(config.title, "The Curious Cat");
        assert_eq!(config.story.len(), 3);
        assert_eq!(config.caption_style, CaptionStyle::Static);
        assert!(config.background_music.is_none());
        assert!(config.closing_credits.is_none());
    }

    #[test]
    fn test_story_with_music_and_credits() {
        let json = r#"{
            "style": "digital art",
            "story": ["One line."],
            "title": "T",
            "caption_style": "dynamic",
            "background_music": {"prompt": "ambient electronic"},
            "closing_credits": {
                "music": {"file": "credits.mp3"},
                "poster": {"prompt": "a cat poster"}
            }
        }"#;
        let config = StoryConfig::from_json(json).unwrap();
        assert_eq!(config.caption_style, CaptionStyle::Dynamic);
        assert_eq!(
            config.background_music.unwrap().prompt.as_deref(),
            Some("ambient electronic")
        );
        let credits = config.closing_credits.unwrap();
        assert_eq!(credits.music.file.as_deref(), Some("credits.mp3"));
        assert!(credits.poster.file.is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let json = r#"{"style": "s", "story": []}"#;
        assert!(matches!(StoryConfig::from_json(json), Err(CoreError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_caption_style() {
        let json = r#"{"style":"s","story":[],"title":"t","caption_style":"karaoke"}"#;
        let err = StoryConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("karaoke"));
    }

    #[test]
    fn test_null_caption_style_is_static() {
        let json = r#"{"style":"s","story":[],"title":"t","caption_style":null}"#;
        assert_eq!(
            StoryConfig::from_json(json).unwrap().caption_style,
            CaptionStyle::Static
        );
    }

    #[test]
    fn test_music_source_needs_exactly_one() {
        let both_null = r#"{"style":"s","story":[],"title":"t",
            "background_music":{"file":null,"prompt":null}}"#;
        assert!(matches!(
            StoryConfig::from_json(both_null),
            Err(CoreError::ValidationError(_))
        ));

        let both_set = r#"{"style":"s","story":[],"title":"t",
            "background_music":{"file":"a.mp3","prompt":"p"}}"#;
        let err = StoryConfig::from_json(both_set).unwrap_err();
        assert!(err.to_string().contains("both"));

        let bad_poster = r#"{"style":"s","story":[],"title":"t",
            "closing_credits":{"music":{"file":"a.mp3"},"poster":{}}}"#;
        assert!(StoryConfig::from_json(bad_poster).is_err());
    }

    #[test]
    fn test_load_story_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.json");
        fs::write(&path, STORY).unwrap();
        assert_eq!(StoryConfig::load(&path).unwrap().style, "digital art");
        assert!(StoryConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
