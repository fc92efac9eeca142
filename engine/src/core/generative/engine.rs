//! Backend Chain
//!
//! Runs a generation request against an ordered list of backends. The first
//! capable backend is retried with exponential backoff; later backends are
//! fallbacks tried once each.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::providers::{GenerationBackend, GenerationRequest};
use crate::core::{CoreError, CoreResult};

/// Retry schedule for the primary backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based): `base * 2^attempt`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Polling and retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendChainConfig {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for BackendChainConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            timeout_secs: 600,
            retry: RetryPolicy::default(),
        }
    }
}

/// Ordered fallback chain of generation backends
#[derive(Clone, Default)]
pub struct BackendChain {
    backends: Vec<Arc<dyn GenerationBackend>>,
    config: BackendChainConfig,
}

impl BackendChain {
    pub fn new(config: BackendChainConfig) -> Self {
        Self {
            backends: Vec::new(),
            config,
        }
    }

    /// Appends a backend at the lowest priority
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn config(&self) -> &BackendChainConfig {
        &self.config
    }

    /// Generates an artifact, falling back through the chain.
    pub fn generate(&self, request: &GenerationRequest) -> CoreResult<PathBuf> {
        let capable: Vec<&Arc<dyn GenerationBackend>> = self
            .backends
            .iter()
            .filter(|b| b.supports(request.capability))
            .collect();

        let Some((primary, fallbacks)) = capable.split_first() else {
            return Err(CoreError::NotSupported(format!(
                "No backend supports {}",
                request.capability
            )));
        };

        let mut last_error = match self.run_with_retries(primary.as_ref(), request) {
            Ok(path) => return Ok(path),
            Err(e) => e,
        };

        for backend in fallbacks {
            info!(backend = backend.name(), "Primary backend failed, attempting fallback");
            match self.run_once(backend.as_ref(), request) {
                Ok(path) => return Ok(path),
                Err(e) => {
                    error!(backend = backend.name(), error = %e, "Fallback backend failed");
                    last_error = e;
                }
            }
        }

        Err(CoreError::GenerationFailed(format!(
            "All backends failed for {}: {}",
            request.capability, last_error
        )))
    }

    fn run_with_retries(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
    ) -> CoreResult<PathBuf> {
        let attempts = self.config.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry.delay_for(attempt);
                info!(
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying generation"
                );
                std::thread::sleep(delay);
            }

            match self.run_once(backend, request) {
                Ok(path) => {
                    if attempt > 0 {
                        info!(attempts = attempt + 1, "Generation succeeded after retry");
                    }
                    return Ok(path);
                }
                Err(e) => {
                    warn!(
                        backend = backend.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "Generation attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CoreError::GenerationFailed(format!("{} made no attempts", backend.name()))
        }))
    }

    /// Start, poll until complete or timed out, fetch.
    fn run_once(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
    ) -> CoreResult<PathBuf> {
        let job_id = backend.start_generation(request)?;
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            let progress = backend.check_progress(&job_id)?;
            info!(
                backend = backend.name(),
                status = %progress.status,
                percent = progress.percent,
                "Generation progress"
            );
            if progress.is_complete() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(CoreError::Timeout(format!(
                    "{} job {} after {}s",
                    backend.name(),
                    job_id,
                    self.config.timeout_secs
                )));
            }
            std::thread::sleep(poll_interval);
        }

        backend.get_result(&job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generative::providers::{
        GenerationProgress, MockGenerationBackend, ProviderCapability,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> BackendChainConfig {
        BackendChainConfig {
            poll_interval_ms: 0,
            timeout_secs: 5,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        }
    }

    /// Fails the first `failures` starts, then succeeds
    struct Flaky {
        failures: u32,
        starts: AtomicU32,
        dir: PathBuf,
    }

    impl GenerationBackend for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn capabilities(&self) -> Vec<ProviderCapability> {
            vec![ProviderCapability::MusicGeneration]
        }
        fn start_generation(&self, _request: &GenerationRequest) -> CoreResult<String> {
            let n = self.starts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(CoreError::GenerationFailed("busy".to_string()))
            } else {
                Ok("job".to_string())
            }
        }
        fn check_progress(&self, _job_id: &str) -> CoreResult<GenerationProgress> {
            Ok(GenerationProgress::new("done", 100.0))
        }
        fn get_result(&self, _job_id: &str) -> CoreResult<PathBuf> {
            Ok(self.dir.join("flaky.mp3"))
        }
    }

    /// Never completes
    struct Stuck;

    impl GenerationBackend for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }
        fn capabilities(&self) -> Vec<ProviderCapability> {
            vec![ProviderCapability::ImageGeneration]
        }
        fn start_generation(&self, _request: &GenerationRequest) -> CoreResult<String> {
            Ok("job".to_string())
        }
        fn check_progress(&self, _job_id: &str) -> CoreResult<GenerationProgress> {
            Ok(GenerationProgress::new("queued", 10.0))
        }
        fn get_result(&self, _job_id: &str) -> CoreResult<PathBuf> {
            Err(CoreError::GenerationFailed("not ready".to_string()))
        }
    }

    #[test]
    fn test_retry_delay_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(5_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(5_000));
    }

    #[test]
    fn test_primary_success() {
        let dir = tempfile::tempdir().unwrap();
        let chain = BackendChain::new(fast_config())
            .with_backend(Arc::new(MockGenerationBackend::new("primary", dir.path()).with_polls(3)))
            .with_backend(Arc::new(MockGenerationBackend::new("fallback", dir.path())));

        let request = GenerationRequest::new(ProviderCapability::ImageGeneration, "a lighthouse");
        let path = chain.generate(&request).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("primary_"));
    }

    #[test]
    fn test_primary_retried_before_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let flaky = Arc::new(Flaky {
            failures: 2,
            starts: AtomicU32::new(0),
            dir: dir.path().to_path_buf(),
        });
        let chain = BackendChain::new(fast_config())
            .with_backend(flaky.clone())
            .with_backend(Arc::new(MockGenerationBackend::new("fallback", dir.path())));

        let request = GenerationRequest::new(ProviderCapability::MusicGeneration, "ambient");
        let path = chain.generate(&request).unwrap();
        assert_eq!(path, dir.path().join("flaky.mp3"));
        assert_eq!(flaky.starts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fallback_after_exhausted_retries() {
        let dir = tempfile::tempdir().unwrap();
        let chain = BackendChain::new(fast_config())
            .with_backend(Arc::new(MockGenerationBackend::new("down", dir.path()).failing()))
            .with_backend(Arc::new(MockGenerationBackend::new("meta", dir.path())));

        let request = GenerationRequest::new(ProviderCapability::MusicGeneration, "upbeat");
        let path = chain.generate(&request).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("meta_"));
    }

    #[test]
    fn test_capability_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let chain = BackendChain::new(fast_config()).with_backend(Arc::new(
            MockGenerationBackend::new("images", dir.path())
                .with_capabilities(vec![ProviderCapability::ImageGeneration]),
        ));

        let request = GenerationRequest::new(ProviderCapability::TextToSpeech, "hello");
        assert!(matches!(chain.generate(&request), Err(CoreError::NotSupported(_))));
        assert!(matches!(
            BackendChain::default().generate(&request),
            Err(CoreError::NotSupported(_))
        ));
    }

    #[test]
    fn test_all_backends_fail() {
        let dir = tempfile::tempdir().unwrap();
        let chain = BackendChain::new(fast_config())
            .with_backend(Arc::new(MockGenerationBackend::new("a", dir.path()).failing()))
            .with_backend(Arc::new(MockGenerationBackend::new("b", dir.path()).failing()));
        assert_eq!(chain.backend_names(), vec!["a", "b"]);

        let request = GenerationRequest::new(ProviderCapability::ImageGeneration, "poster");
        assert!(matches!(chain.generate(&request), Err(CoreError::GenerationFailed(_))));
    }

    #[test]
    fn test_polling_times_out() {
        let config = BackendChainConfig {
            timeout_secs: 0,
            retry: RetryPolicy {
                max_attempts: 1,
                ..fast_config().retry
            },
            ..fast_config()
        };
        let chain = BackendChain::new(config).with_backend(Arc::new(Stuck));
        let request = GenerationRequest::new(ProviderCapability::ImageGeneration, "poster");
        let err = chain.generate(&request).unwrap_err();
        assert!(matches!(err, CoreError::GenerationFailed(ref msg) if msg.contains("timed out")));
    }
}
