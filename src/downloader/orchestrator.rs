// Download orchestration: metadata fetch with client fallback, background
// execution, progress polling, and backoff retry

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{interval, sleep, timeout};

use super::engine::ExtractionEngine;
use super::errors::DownloadError;
use super::models::{DownloadRequest, DownloadState, EngineConfig, VideoMetadata};
use super::request::{compile, EngineOptions};
use super::url;

/// Fixed progress poll interval
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Bounded wait for the background task's final result after completion
const RESULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Background slots per orchestrator. Only one is used by the download
/// path; the second keeps a stray fetch from starving the prompt loop.
const WORKER_SLOTS: usize = 2;

/// Receives state snapshots from the monitor loop.
pub trait ProgressSink: Send + Sync {
    fn update(&self, state: &DownloadState);
}

/// Sink that drops everything (metadata-only flows, tests).
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _state: &DownloadState) {}
}

/// Outcome of a download run, after all internal retries.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub result: Result<(), DownloadError>,
    /// State of the last attempt at the moment it went terminal
    pub final_state: DownloadState,
    /// Total submissions to the background unit
    pub attempts: u32,
}

/// One orchestrator per user session. Owns the engine handle and the
/// worker slots; never performs a transfer on the calling task.
pub struct Orchestrator {
    engine: Arc<dyn ExtractionEngine>,
    config: EngineConfig,
    workers: Arc<Semaphore>,
    poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn ExtractionEngine>, config: EngineConfig) -> Self {
        Self {
            engine,
            config,
            workers: Arc::new(Semaphore::new(WORKER_SLOTS)),
            poll_interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Metadata-only fetch. Validates before any engine call, then walks
    /// the client-identity list on access-denied class failures, retrying
    /// the whole list up to the attempt budget.
    pub async fn fetch_metadata(&self, url_text: &str) -> Result<VideoMetadata, DownloadError> {
        if !url::is_valid_url(url_text) {
            return Err(DownloadError::InvalidInput(url_text.to_string()));
        }

        let mut last_denied: Option<DownloadError> = None;

        for attempt in 0..self.config.retry.max_attempts {
            if attempt > 0 {
                let delay = self.config.retry.delay_for(attempt);
                eprintln!(
                    "[Orchestrator] Metadata attempt {} after {:?}",
                    attempt + 1,
                    delay
                );
                sleep(delay).await;
            }

            for variant in 0..self.config.clients.len() {
                match self.engine.fetch_metadata(url_text, &self.config, variant).await {
                    Ok(metadata) => return Ok(metadata),
                    Err(e) if e.is_retryable() => {
                        eprintln!(
                            "[Orchestrator] Client '{}' denied: {}",
                            self.config.client(variant).player_client,
                            e
                        );
                        last_denied = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Err(DownloadError::ExtractionFailed(format!(
            "All client identities exhausted: {}",
            last_denied.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Run a download to a terminal outcome, retrying the access-denied
    /// class with rotated client identities and exponential backoff.
    /// Non-retryable failures report immediately without consuming the
    /// retry budget.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        output_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> DownloadOutcome {
        if !url::is_valid_url(&request.url) {
            return DownloadOutcome {
                result: Err(DownloadError::InvalidInput(request.url.clone())),
                final_state: DownloadState::default(),
                attempts: 0,
            };
        }

        let options = compile(request);
        let mut attempts = 0;

        loop {
            if attempts > 0 {
                let delay = self.config.retry.delay_for(attempts);
                eprintln!(
                    "[Orchestrator] Retrying with client '{}' after {:?}",
                    self.config.client(attempts as usize).player_client,
                    delay
                );
                sleep(delay).await;
            }

            let (result, state) = self
                .run_attempt(&request.url, &options, attempts as usize, output_dir, sink)
                .await;
            attempts += 1;

            match result {
                Ok(()) => {
                    return DownloadOutcome {
                        result: Ok(()),
                        final_state: state,
                        attempts,
                    };
                }
                Err(e) if e.is_retryable() && attempts < self.config.retry.max_attempts => {
                    // Transient for the user: reset and go around
                    sink.update(&DownloadState::default());
                    continue;
                }
                Err(e) => {
                    return DownloadOutcome {
                        result: Err(e),
                        final_state: state,
                        attempts,
                    };
                }
            }
        }
    }

    /// One submission to the background unit plus its monitor loop.
    async fn run_attempt(
        &self,
        url_text: &str,
        options: &EngineOptions,
        rotation: usize,
        output_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> (Result<(), DownloadError>, DownloadState) {
        let state = Arc::new(Mutex::new(DownloadState::starting()));

        let permit = match self.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return (
                    Err(DownloadError::DownloadFailed("Worker pool closed".into())),
                    DownloadState::default(),
                );
            }
        };

        let engine = Arc::clone(&self.engine);
        let config = self.config.clone();
        let task_options = options.clone();
        let task_url = url_text.to_string();
        let task_dir = PathBuf::from(output_dir);
        let task_state = Arc::clone(&state);

        // Submit immediately; the caller only polls from here on
        let handle = tokio::spawn(async move {
            let _permit = permit;
            engine
                .download(
                    &task_url,
                    &task_options,
                    &config,
                    rotation,
                    &task_dir,
                    task_state,
                )
                .await
        });

        let mut ticker = interval(self.poll_interval);
        while !handle.is_finished() {
            ticker.tick().await;
            let snapshot = state.lock().expect("download state poisoned").clone();
            sink.update(&snapshot);
        }

        // The task has finished; the bounded wait covers join delivery only
        let result = match timeout(RESULT_TIMEOUT, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DownloadError::DownloadFailed(format!(
                "Background task failed: {}",
                join_err
            ))),
            Err(_) => Err(DownloadError::DownloadFailed(
                "Timed out waiting for the background task result".into(),
            )),
        };

        let final_state = state.lock().expect("download state poisoned").clone();
        sink.update(&final_state);
        (result, final_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{
        DownloadKind, DownloadStatus, Quality, RetryConfig, Sidecars,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Engine double with a scripted result sequence.
    struct MockEngine {
        submissions: AtomicU32,
        metadata_calls: AtomicU32,
        script: Mutex<Vec<Result<(), DownloadError>>>,
    }

    impl MockEngine {
        fn scripted(script: Vec<Result<(), DownloadError>>) -> Self {
            Self {
                submissions: AtomicU32::new(0),
                metadata_calls: AtomicU32::new(0),
                script: Mutex::new(script),
            }
        }

        fn next_result(&self) -> Result<(), DownloadError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(())
            } else {
                script.remove(0)
            }
        }
    }

    #[async_trait]
    impl ExtractionEngine for MockEngine {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn fetch_metadata(
            &self,
            _url: &str,
            _config: &EngineConfig,
            _rotation: usize,
        ) -> Result<VideoMetadata, DownloadError> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            self.next_result().map(|_| VideoMetadata {
                id: "dQw4w9WgXcQ".to_string(),
                title: "ok".to_string(),
                uploader: "mock".to_string(),
                duration: 1,
                view_count: None,
                upload_date: None,
                description: String::new(),
                thumbnail: None,
                formats: Vec::new(),
                availability: None,
                age_limit: 0,
            })
        }

        async fn download(
            &self,
            _url: &str,
            _options: &EngineOptions,
            _config: &EngineConfig,
            _rotation: usize,
            _output_dir: &Path,
            state: Arc<Mutex<DownloadState>>,
        ) -> Result<(), DownloadError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            let result = self.next_result();
            let mut guard = state.lock().unwrap();
            *guard = match &result {
                Ok(()) => DownloadState {
                    status: DownloadStatus::Finished,
                    progress: 100.0,
                    ..DownloadState::default()
                },
                Err(e) => DownloadState {
                    status: DownloadStatus::Error,
                    error: Some(e.to_string()),
                    ..DownloadState::default()
                },
            };
            result
        }
    }

    fn fast_config(max_attempts: u32) -> EngineConfig {
        let mut config = EngineConfig::hardened();
        config.retry = RetryConfig {
            max_attempts,
            base_delay_secs: 0,
            backoff_multiplier: 2,
            max_delay_secs: 0,
        };
        config
    }

    fn orchestrator(engine: Arc<MockEngine>, max_attempts: u32) -> Orchestrator {
        Orchestrator::new(engine, fast_config(max_attempts))
            .with_poll_interval(Duration::from_millis(5))
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            kind: DownloadKind::VideoAudio,
            quality: Quality::Best,
            container: "mp4".to_string(),
            sidecars: Sidecars::default(),
        }
    }

    #[tokio::test]
    async fn test_access_denied_retries_then_succeeds() {
        let engine = Arc::new(MockEngine::scripted(vec![
            Err(DownloadError::AccessDenied),
            Err(DownloadError::AccessDenied),
            Ok(()),
        ]));
        let orch = orchestrator(Arc::clone(&engine), 4);

        let outcome = orch
            .download(&request(), Path::new("/tmp"), &NullSink)
            .await;

        // N=2 denials below the cap: exactly N+1 submissions
        assert_eq!(engine.submissions.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.final_state.status, DownloadStatus::Finished);
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let engine = Arc::new(MockEngine::scripted(vec![Err(
            DownloadError::CopyrightBlocked,
        )]));
        let orch = orchestrator(Arc::clone(&engine), 4);

        let outcome = orch
            .download(&request(), Path::new("/tmp"), &NullSink)
            .await;

        assert_eq!(engine.submissions.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result, Err(DownloadError::CopyrightBlocked));
        assert_eq!(outcome.final_state.status, DownloadStatus::Error);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let engine = Arc::new(MockEngine::scripted(vec![
            Err(DownloadError::AccessDenied),
            Err(DownloadError::RateLimited),
            Err(DownloadError::AccessDenied),
        ]));
        let orch = orchestrator(Arc::clone(&engine), 3);

        let outcome = orch
            .download(&request(), Path::new("/tmp"), &NullSink)
            .await;

        assert_eq!(engine.submissions.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.result, Err(DownloadError::AccessDenied));
        assert_eq!(outcome.final_state.status, DownloadStatus::Error);
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_engine() {
        let engine = Arc::new(MockEngine::scripted(Vec::new()));
        let orch = orchestrator(Arc::clone(&engine), 3);

        let err = orch.fetch_metadata("not a url").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidInput(_)));

        let mut bad = request();
        bad.url = "https://example.com/watch?v=dQw4w9WgXcQ".to_string();
        let outcome = orch.download(&bad, Path::new("/tmp"), &NullSink).await;
        assert!(matches!(
            outcome.result,
            Err(DownloadError::InvalidInput(_))
        ));

        assert_eq!(engine.submissions.load(Ordering::SeqCst), 0);
        assert_eq!(engine.metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_metadata_falls_through_client_variants() {
        // First identity denied, second succeeds, third never tried
        let engine = Arc::new(MockEngine::scripted(vec![
            Err(DownloadError::AccessDenied),
            Ok(()),
        ]));
        let orch = orchestrator(Arc::clone(&engine), 3);

        let metadata = orch
            .fetch_metadata("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(metadata.id, "dQw4w9WgXcQ");
        assert_eq!(engine.metadata_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metadata_terminal_error_stops_fallthrough() {
        let engine = Arc::new(MockEngine::scripted(vec![Err(
            DownloadError::PrivateOrUnavailable,
        )]));
        let orch = orchestrator(Arc::clone(&engine), 3);

        let err = orch
            .fetch_metadata("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert_eq!(err, DownloadError::PrivateOrUnavailable);
        assert_eq!(engine.metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metadata_exhaustion_is_extraction_failed() {
        // hardened() carries 3 identities; 3 attempts x 3 variants, all denied
        let engine = Arc::new(MockEngine::scripted(vec![
            Err(DownloadError::AccessDenied);
            9
        ]));
        let orch = orchestrator(Arc::clone(&engine), 3);

        let err = orch
            .fetch_metadata("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ExtractionFailed(_)));
        assert_eq!(engine.metadata_calls.load(Ordering::SeqCst), 9);
    }
}
