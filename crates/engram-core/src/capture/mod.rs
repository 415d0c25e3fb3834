//! Session Capture
//!
//! Background capture of agent-session transcripts: significance
//! gating, a durable dedup'd job queue, and a single cooperative worker
//! that summarizes transcripts through the LLM provider into
//! `session_summary` documents.
//!
//! Modes: `async` (default) enqueues and returns; the worker processes
//! later. `sync` blocks until processing completes or the configured
//! timeout elapses.

pub mod processor;
pub mod queue;
pub mod transcript;

pub use processor::{process_session, session_already_captured, ProcessingResult, MAX_TRANSCRIPT_CHARS};
pub use queue::{fingerprint, CaptureJob, CaptureQueue};
pub use transcript::{score_significance, ParsedTranscript, Significance, ToolCall, TranscriptMessage};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::RuntimeConfig;
use crate::error::{lock_poisoned, EngramError, Result};
use crate::llm::LlmProvider;
use crate::memory::MemoryStore;

// ============================================================================
// SERVICE
// ============================================================================

/// The capture front door shared by hooks (producers) and the worker.
/// Cloning shares all state, so a clone can run on a worker thread.
#[derive(Clone)]
pub struct CaptureService {
    queue: Arc<CaptureQueue>,
    memory: Arc<MemoryStore>,
    provider: Arc<dyn LlmProvider>,
    config: Arc<RwLock<RuntimeConfig>>,
}

impl CaptureService {
    pub fn new(
        queue: Arc<CaptureQueue>,
        memory: Arc<MemoryStore>,
        provider: Arc<dyn LlmProvider>,
        config: Arc<RwLock<RuntimeConfig>>,
    ) -> Self {
        Self {
            queue,
            memory,
            provider,
            config,
        }
    }

    /// Capture a finished session. Gates on significance, dedups
    /// against both the queue and the store, then enqueues (async mode)
    /// or processes inline with a timeout (sync mode).
    pub fn capture(
        &self,
        session_id: &str,
        transcript_path: &Path,
        repository: Option<&str>,
    ) -> Result<Value> {
        let config = self
            .config
            .read()
            .map_err(|_| lock_poisoned("runtime config"))?
            .clone();
        if !config.autocapture.enabled {
            return Ok(json!({"status": "disabled"}));
        }

        let raw = std::fs::read_to_string(transcript_path).map_err(|e| {
            EngramError::InvalidArgument(format!(
                "unreadable transcript {}: {}",
                transcript_path.display(),
                e
            ))
        })?;
        let parsed = ParsedTranscript::parse(session_id, &raw);

        let significance = score_significance(&parsed, &config.autocapture);
        if !significance.significant {
            tracing::debug!(session = %session_id, "session below significance thresholds");
            return Ok(json!({"status": "skipped", "reason": "not_significant", "significance": significance}));
        }

        if session_already_captured(self.memory.collection(), session_id)? {
            return Ok(json!({"status": "duplicate", "session_id": session_id}));
        }

        let repository = repository
            .map(str::to_string)
            .or_else(|| processor::repository_from_transcript(&parsed))
            .unwrap_or_else(|| "global".to_string());
        let job = CaptureJob::new(session_id, transcript_path.to_path_buf(), &repository);

        if config.autocapture.async_mode {
            let enqueued = self.queue.enqueue(job)?;
            return Ok(json!({
                "status": if enqueued { "queued" } else { "duplicate" },
                "session_id": session_id,
                "queue_depth": self.queue.len(),
            }));
        }

        // Sync mode: process on a side thread so the timeout is real
        let service = self.clone();
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let result = service.process_job(&job);
            let _ = sender.send(result);
        });

        match receiver.recv_timeout(Duration::from_secs(config.autocapture.sync_timeout)) {
            Ok(result) => Ok(json!({
                "status": if result.success { "processed" } else { "failed" },
                "session_id": result.session_id,
                "summary": result.summary,
                "error": result.error,
            })),
            Err(_) => Err(EngramError::Unavailable(format!(
                "session processing timed out after {}s",
                config.autocapture.sync_timeout
            ))),
        }
    }

    /// Process one job end to end (worker and sync path)
    fn process_job(&self, job: &CaptureJob) -> ProcessingResult {
        let raw = match std::fs::read_to_string(&job.transcript_path) {
            Ok(raw) => raw,
            Err(e) => {
                return ProcessingResult {
                    success: false,
                    session_id: job.session_id.clone(),
                    summary: None,
                    error: Some(format!("transcript vanished: {}", e)),
                }
            }
        };
        let parsed = ParsedTranscript::parse(&job.session_id, &raw);

        // At-most-once per session: a summary may have landed between
        // enqueue and processing.
        match session_already_captured(self.memory.collection(), &job.session_id) {
            Ok(true) => {
                return ProcessingResult {
                    success: true,
                    session_id: job.session_id.clone(),
                    summary: None,
                    error: Some("already_captured".to_string()),
                }
            }
            Ok(false) => {}
            Err(e) => {
                return ProcessingResult {
                    success: false,
                    session_id: job.session_id.clone(),
                    summary: None,
                    error: Some(e.to_string()),
                }
            }
        }

        process_session(&self.memory, self.provider.as_ref(), &parsed, &job.repository)
    }

    /// Queue depth, thresholds, and provider for the status operation
    pub fn status(&self) -> Result<Value> {
        let config = self
            .config
            .read()
            .map_err(|_| lock_poisoned("runtime config"))?;
        Ok(json!({
            "enabled": config.autocapture.enabled,
            "async": config.autocapture.async_mode,
            "queue_depth": self.queue.len(),
            "provider": self.provider.name(),
            "thresholds": {
                "min_tokens": config.autocapture.min_tokens,
                "min_tool_calls": config.autocapture.min_tool_calls,
                "min_file_edits": config.autocapture.min_file_edits,
            },
        }))
    }

    /// Start the single worker thread draining the queue FIFO
    pub fn spawn_worker(&self) -> WorkerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);
        let service = self.clone();

        let handle = std::thread::spawn(move || {
            tracing::info!("capture worker started");
            while !worker_shutdown.load(Ordering::Relaxed) {
                match service.queue.pop_front() {
                    Ok(Some(job)) => {
                        let result = service.process_job(&job);
                        if !result.success {
                            tracing::warn!(
                                session = %result.session_id,
                                "capture job dropped: {}",
                                result.error.as_deref().unwrap_or("unknown")
                            );
                        }
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(200)),
                    Err(e) => {
                        tracing::error!("capture queue error: {}", e);
                        std::thread::sleep(Duration::from_secs(1));
                    }
                }
            }
            tracing::info!("capture worker stopped");
        });

        WorkerHandle {
            shutdown,
            handle: Some(handle),
        }
    }
}

// ============================================================================
// WORKER HANDLE
// ============================================================================

/// Shutdown handle for the capture worker
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signal the worker and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::search::lexical::LexicalIndex;
    use crate::store::{Collection, WhereFilter};
    use tempfile::TempDir;

    struct MockProvider;

    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }
        fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("Worked on the uploader and fixed retry handling.".to_string())
        }
    }

    fn setup(async_mode: bool) -> (TempDir, Arc<Collection>, Arc<CaptureService>) {
        let dir = TempDir::new().unwrap();
        let collection = Arc::new(
            Collection::open(dir.path().join("engram.db"), Arc::new(Embedder::new())).unwrap(),
        );
        let memory = Arc::new(MemoryStore::new(
            Arc::clone(&collection),
            Arc::new(LexicalIndex::new()),
        ));
        let mut config = RuntimeConfig::default();
        config.autocapture.async_mode = async_mode;
        config.autocapture.min_tokens = 1;
        config.autocapture.min_tool_calls = 1;
        config.autocapture.min_file_edits = 1;

        let service = Arc::new(CaptureService::new(
            Arc::new(CaptureQueue::open(dir.path()).unwrap()),
            memory,
            Arc::new(MockProvider),
            Arc::new(RwLock::new(config)),
        ));
        (dir, collection, service)
    }

    fn write_transcript(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("session.jsonl");
        std::fs::write(
            &path,
            r#"{"type":"user","cwd":"/home/dev/api","message":{"content":"please fix the retry logic in the uploader module"}}
{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Edit","input":{"file_path":"src/upload.py"}}]}}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_async_capture_enqueues_and_worker_drains() {
        let (dir, collection, service) = setup(true);
        let transcript = write_transcript(dir.path());

        let response = service.capture("sess-1", &transcript, Some("api")).unwrap();
        assert_eq!(response["status"], "queued");

        let worker = service.spawn_worker();
        let deadline = std::time::Instant::now() + Duration::from_secs(30);
        loop {
            let docs = collection
                .get_where(Some(&WhereFilter::eq("type", "session_summary")))
                .unwrap();
            if docs.len() == 1 {
                assert!(docs[0].text.contains("uploader"));
                break;
            }
            assert!(std::time::Instant::now() < deadline, "worker never processed");
            std::thread::sleep(Duration::from_millis(50));
        }
        worker.stop();
    }

    #[test]
    fn test_sync_capture_processes_inline() {
        let (dir, collection, service) = setup(false);
        let transcript = write_transcript(dir.path());

        let response = service.capture("sess-2", &transcript, Some("api")).unwrap();
        assert_eq!(response["status"], "processed");
        assert_eq!(collection.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_session_dropped() {
        let (dir, _collection, service) = setup(false);
        let transcript = write_transcript(dir.path());

        service.capture("sess-3", &transcript, Some("api")).unwrap();
        let second = service.capture("sess-3", &transcript, Some("api")).unwrap();
        assert_eq!(second["status"], "duplicate");
    }

    #[test]
    fn test_insignificant_session_skipped() {
        let (dir, collection, service) = setup(true);
        // Raise thresholds well above the sample transcript
        service
            .config
            .write()
            .unwrap()
            .autocapture
            .min_tokens = 1_000_000;
        let transcript = write_transcript(dir.path());

        let response = service.capture("sess-4", &transcript, Some("api")).unwrap();
        assert_eq!(response["status"], "skipped");
        assert_eq!(collection.count().unwrap(), 0);
        assert!(service.queue.is_empty());
    }

    #[test]
    fn test_missing_transcript_is_invalid_argument() {
        let (_dir, _collection, service) = setup(true);
        let err = service
            .capture("sess-5", Path::new("/no/such/transcript.jsonl"), None)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
