//! Speech Collaborators
//!
//! Word alignment and speech synthesis contracts. Real speech-to-text and
//! text-to-speech services plug in behind these traits; [`EvenAlignment`] is
//! the always-available fallback that spreads words over the audio duration.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::engine::BackendChain;
use super::providers::{GenerationRequest, ProviderCapability};
use crate::core::captions::{CaptionEntry, TimedWord};
use crate::core::ffmpeg::MediaTool;
use crate::core::{CoreError, CoreResult, TimeSec};

/// Produces per-word timings for narration audio
pub trait AlignmentProvider: Send + Sync {
    fn name(&self) -> &str;

    fn align(&self, audio: &Path, text: &str) -> CoreResult<Vec<TimedWord>>;
}

/// Turns text into a narration audio file
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> CoreResult<PathBuf>;
}

/// Splits `duration` evenly across the words of `text`
pub fn distribute_evenly(text: &str, duration: TimeSec) -> Vec<TimedWord> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let per_word = duration.max(0.0) / words.len() as f64;
    words
        .into_iter()
        .enumerate()
        .map(|(i, word)| {
            TimedWord::new(word, i as f64 * per_word, (i + 1) as f64 * per_word)
        })
        .collect()
}

/// Alignment by even distribution over the probed audio duration
pub struct EvenAlignment<'a> {
    tool: &'a dyn MediaTool,
}

impl<'a> EvenAlignment<'a> {
    pub fn new(tool: &'a dyn MediaTool) -> Self {
        Self { tool }
    }
}

impl AlignmentProvider for EvenAlignment<'_> {
    fn name(&self) -> &str {
        "even"
    }

    fn align(&self, audio: &Path, text: &str) -> CoreResult<Vec<TimedWord>> {
        let duration = self
            .tool
            .probe_duration(audio)
            .map_err(|e| CoreError::AlignmentFailed(e.to_string()))?;
        let words = distribute_evenly(text, duration);
        if words.is_empty() {
            return Err(CoreError::AlignmentFailed("No words to align".to_string()));
        }
        info!(
            words = words.len(),
            duration, "Created evenly distributed timings"
        );
        Ok(words)
    }
}

/// Timings from `primary`, falling back to `fallback` on error or empty output.
///
/// Returns an empty list (after logging) when both fail.
pub fn align_or_distribute(
    primary: Option<&dyn AlignmentProvider>,
    fallback: &dyn AlignmentProvider,
    audio: &Path,
    text: &str,
) -> Vec<TimedWord> {
    if let Some(primary) = primary {
        match primary.align(audio, text) {
            Ok(words) if !words.is_empty() => return words,
            Ok(_) => warn!(aligner = primary.name(), "No words aligned, falling back"),
            Err(e) => warn!(aligner = primary.name(), error = %e, "Alignment failed, falling back"),
        }
    }

    match fallback.align(audio, text) {
        Ok(words) => words,
        Err(e) => {
            error!(aligner = fallback.name(), error = %e, "Fallback alignment failed");
            Vec::new()
        }
    }
}

/// One caption entry per aligned word
pub fn create_word_level_captions(
    primary: Option<&dyn AlignmentProvider>,
    fallback: &dyn AlignmentProvider,
    audio: &Path,
    text: &str,
) -> Vec<CaptionEntry> {
    align_or_distribute(primary, fallback, audio, text)
        .into_iter()
        .map(|w| CaptionEntry::new(w.text, w.start, w.end))
        .collect()
}

/// Speech synthesis through a generation backend chain
pub struct ChainSynthesizer {
    chain: BackendChain,
}

impl ChainSynthesizer {
    pub fn new(chain: BackendChain) -> Self {
        Self { chain }
    }
}

impl SpeechSynthesizer for ChainSynthesizer {
    fn synthesize(&self, text: &str) -> CoreResult<PathBuf> {
        if text.trim().is_empty() {
            return Err(CoreError::ValidationError("Nothing to synthesize".to_string()));
        }
        self.chain
            .generate(&GenerationRequest::new(ProviderCapability::TextToSpeech, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ffmpeg::{FFmpegError, FFmpegResult};
    use crate::core::generative::engine::BackendChainConfig;
    use crate::core::generative::providers::MockGenerationBackend;
    use std::sync::Arc;

    struct DurationTool(Option<f64>);

    impl MediaTool for DurationTool {
        fn run_ffmpeg(&self, _args: &[String]) -> FFmpegResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn run_ffprobe(&self, _args: &[String]) -> FFmpegResult<String> {
            self.0
                .map(|d| format!("{}\n", d))
                .ok_or_else(|| FFmpegError::ProbeError("unreadable".to_string()))
        }
    }

    struct Fixed(CoreResult<Vec<TimedWord>>);

    impl AlignmentProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn align(&self, _audio: &Path, _text: &str) -> CoreResult<Vec<TimedWord>> {
            match &self.0 {
                Ok(words) => Ok(words.clone()),
                Err(e) => Err(CoreError::AlignmentFailed(e.to_string())),
            }
        }
    }

    fn audio() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.mp3");
        std::fs::write(&path, b"audio").unwrap();
        (dir, path)
    }

    #[test]
    fn test_distribute_evenly() {
        let words = distribute_evenly("one two three four", 2.0);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0].start, 0.0);
        assert!((words[1].start - 0.5).abs() < 1e-9);
        assert!((words[3].end - 2.0).abs() < 1e-9);
        assert!(distribute_evenly("  ", 2.0).is_empty());
    }

    #[test]
    fn test_even_alignment_uses_probed_duration() {
        let (_dir, path) = audio();
        let tool = DurationTool(Some(3.0));
        let words = EvenAlignment::new(&tool).align(&path, "a b c").unwrap();
        assert!((words[2].end - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_even_alignment_probe_failure() {
        let (_dir, path) = audio();
        let tool = DurationTool(None);
        assert!(matches!(
            EvenAlignment::new(&tool).align(&path, "a b"),
            Err(CoreError::AlignmentFailed(_))
        ));
    }

    #[test]
    fn test_align_prefers_primary() {
        let (_dir, path) = audio();
        let tool = DurationTool(Some(10.0));
        let fallback = EvenAlignment::new(&tool);
        let primary = Fixed(Ok(vec![TimedWord::new("hello", 0.3, 0.9)]));

        let words = align_or_distribute(Some(&primary), &fallback, &path, "hello");
        assert_eq!(words, vec![TimedWord::new("hello", 0.3, 0.9)]);
    }

    #[test]
    fn test_align_falls_back_on_error_or_empty() {
        let (_dir, path) = audio();
        let tool = DurationTool(Some(2.0));
        let fallback = EvenAlignment::new(&tool);

        let failing = Fixed(Err(CoreError::AlignmentFailed("model crashed".to_string())));
        let words = align_or_distribute(Some(&failing), &fallback, &path, "hi there");
        assert_eq!(words.len(), 2);
        assert!((words[1].start - 1.0).abs() < 1e-9);

        let empty = Fixed(Ok(Vec::new()));
        assert_eq!(align_or_distribute(Some(&empty), &fallback, &path, "hi there").len(), 2);
    }

    #[test]
    fn test_align_total_failure_is_empty() {
        let (_dir, path) = audio();
        let tool = DurationTool(None);
        let fallback = EvenAlignment::new(&tool);
        assert!(align_or_distribute(None, &fallback, &path, "words").is_empty());
    }

    #[test]
    fn test_word_level_captions() {
        let (_dir, path) = audio();
        let tool = DurationTool(Some(1.0));
        let captions =
            create_word_level_captions(None, &EvenAlignment::new(&tool), &path, "la la");
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[1].text, "la");
        assert!((captions[1].start_time - 0.5).abs() < 1e-9);
        assert!(captions[1].timed_words.is_none());
    }

    #[test]
    fn test_chain_synthesizer() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendChainConfig {
            poll_interval_ms: 0,
            ..BackendChainConfig::default()
        };
        let chain = BackendChain::new(config)
            .with_backend(Arc::new(MockGenerationBackend::new("tts", dir.path())));
        let synth = ChainSynthesizer::new(chain);

        let path = synth.synthesize("Once upon a time").unwrap();
        assert!(path.exists());
        assert!(matches!(synth.synthesize("  "), Err(CoreError::ValidationError(_))));
    }
}
