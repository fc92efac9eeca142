//! Generation Backends
//!
//! Contract for job-based generation services (images, music, speech).
//! A job is started, polled until it reports completion, and its artifact is
//! then fetched as a local file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult};

/// Capabilities supported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCapability {
    /// Still images for story lines and posters
    ImageGeneration,
    /// Narration
    TextToSpeech,
    /// Instrumental background music
    MusicGeneration,
    /// Songs with generated lyrics (closing credits)
    MusicWithLyrics,
}

impl std::fmt::Display for ProviderCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderCapability::ImageGeneration => write!(f, "Image Generation"),
            ProviderCapability::TextToSpeech => write!(f, "Text-to-Speech"),
            ProviderCapability::MusicGeneration => write!(f, "Music Generation"),
            ProviderCapability::MusicWithLyrics => write!(f, "Music With Lyrics"),
        }
    }
}

/// What to generate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub capability: ProviderCapability,
    pub prompt: String,
    /// Source text for generated lyrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_text: Option<String>,
}

impl GenerationRequest {
    pub fn new(capability: ProviderCapability, prompt: impl Into<String>) -> Self {
        Self {
            capability,
            prompt: prompt.into(),
            story_text: None,
        }
    }

    pub fn with_story_text(mut self, story_text: impl Into<String>) -> Self {
        self.story_text = Some(story_text.into());
        self
    }
}

/// Progress report for a running job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub status: String,
    /// 0-100
    pub percent: f64,
}

impl GenerationProgress {
    pub fn new(status: impl Into<String>, percent: f64) -> Self {
        Self {
            status: status.into(),
            percent,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

/// Job-based generation backend
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<ProviderCapability>;

    fn supports(&self, capability: ProviderCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Starts a job and returns its identifier
    fn start_generation(&self, request: &GenerationRequest) -> CoreResult<String>;

    fn check_progress(&self, job_id: &str) -> CoreResult<GenerationProgress>;

    /// Local path of the finished artifact
    fn get_result(&self, job_id: &str) -> CoreResult<PathBuf>;
}

// =============================================================================
// Mock Backend
// =============================================================================

/// Backend that completes after a fixed number of polls and writes a
/// placeholder file
#[derive(Debug)]
pub struct MockGenerationBackend {
    name: String,
    capabilities: Vec<ProviderCapability>,
    output_dir: PathBuf,
    polls_to_complete: u32,
    fail_start: bool,
    jobs: Mutex<HashMap<String, (GenerationRequest, u32)>>,
}

impl MockGenerationBackend {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            capabilities: vec![
                ProviderCapability::ImageGeneration,
                ProviderCapability::TextToSpeech,
                ProviderCapability::MusicGeneration,
                ProviderCapability::MusicWithLyrics,
            ],
            output_dir: output_dir.into(),
            polls_to_complete: 1,
            fail_start: false,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<ProviderCapability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_polls(mut self, polls: u32) -> Self {
        self.polls_to_complete = polls.max(1);
        self
    }

    /// Every `start_generation` call fails
    pub fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, (GenerationRequest, u32)>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl GenerationBackend for MockGenerationBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<ProviderCapability> {
        self.capabilities.clone()
    }

    fn start_generation(&self, request: &GenerationRequest) -> CoreResult<String> {
        if self.fail_start {
            return Err(CoreError::GenerationFailed(format!(
                "{} is unavailable",
                self.name
            )));
        }
        let job_id = uuid::Uuid::new_v4().to_string();
        self.lock_jobs().insert(job_id.clone(), (request.clone(), 0));
        Ok(job_id)
    }

    fn check_progress(&self, job_id: &str) -> CoreResult<GenerationProgress> {
        let mut jobs = self.lock_jobs();
        let (_, polls) = jobs
            .get_mut(job_id)
            .ok_or_else(|| CoreError::GenerationFailed(format!("Unknown job {}", job_id)))?;
        *polls += 1;
        let percent = f64::from(*polls) / f64::from(self.polls_to_complete) * 100.0;
        Ok(GenerationProgress::new("running", percent.min(100.0)))
    }

    fn get_result(&self, job_id: &str) -> CoreResult<PathBuf> {
        let (request, _) = self
            .lock_jobs()
            .remove(job_id)
            .ok_or_else(|| CoreError::GenerationFailed(format!("Unknown job {}", job_id)))?;

        let extension = match request.capability {
            ProviderCapability::ImageGeneration => "png",
            _ => "mp3",
        };
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("{}_{}.{}", self.name, job_id, extension));
        std::fs::write(&path, request.prompt.as_bytes())?;
        Ok(path)
    }
}
