//! Capture Job Queue
//!
//! Durable FIFO of session-capture jobs: a JSON file on disk, appended
//! under a lock by producers and drained by the single worker. Each job
//! carries a fingerprint of its session ID; a fingerprint already in
//! the queue is dropped at enqueue time.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::now_iso;
use crate::error::{lock_poisoned, Result};

// ============================================================================
// JOBS
// ============================================================================

/// One queued transcript-summarization job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CaptureJob {
    pub session_id: String,
    pub transcript_path: PathBuf,
    pub repository: String,
    pub fingerprint: String,
    pub enqueued_at: String,
}

impl CaptureJob {
    pub fn new(session_id: &str, transcript_path: PathBuf, repository: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            transcript_path,
            repository: repository.to_string(),
            fingerprint: fingerprint(session_id),
            enqueued_at: now_iso(),
        }
    }
}

/// Stable fingerprint of a session ID
pub fn fingerprint(session_id: &str) -> String {
    let digest = Sha256::digest(session_id.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// QUEUE
// ============================================================================

const QUEUE_FILE: &str = "capture_queue.json";

/// Durable FIFO job queue
pub struct CaptureQueue {
    path: PathBuf,
    jobs: Mutex<Vec<CaptureJob>>,
}

impl CaptureQueue {
    /// Open the queue, restoring any jobs left from a previous process
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(QUEUE_FILE);
        let jobs = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("unreadable capture queue, starting empty: {}", e);
                vec![]
            }),
            Err(_) => vec![],
        };
        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    /// Append a job. Returns false (and drops the job) when the same
    /// fingerprint is already queued.
    pub fn enqueue(&self, job: CaptureJob) -> Result<bool> {
        let mut jobs = self.jobs.lock().map_err(|_| lock_poisoned("capture queue"))?;
        if jobs.iter().any(|j| j.fingerprint == job.fingerprint) {
            tracing::debug!(session = %job.session_id, "duplicate capture job dropped");
            return Ok(false);
        }
        jobs.push(job);
        self.persist(&jobs)?;
        Ok(true)
    }

    /// Take the oldest job, if any
    pub fn pop_front(&self) -> Result<Option<CaptureJob>> {
        let mut jobs = self.jobs.lock().map_err(|_| lock_poisoned("capture queue"))?;
        if jobs.is_empty() {
            return Ok(None);
        }
        let job = jobs.remove(0);
        self.persist(&jobs)?;
        Ok(Some(job))
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|j| j.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, jobs: &[CaptureJob]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, serde_json::to_string_pretty(jobs)?)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fifo_order() {
        let dir = TempDir::new().unwrap();
        let queue = CaptureQueue::open(dir.path()).unwrap();

        queue
            .enqueue(CaptureJob::new("sess-1", PathBuf::from("/t/1.jsonl"), "repo"))
            .unwrap();
        queue
            .enqueue(CaptureJob::new("sess-2", PathBuf::from("/t/2.jsonl"), "repo"))
            .unwrap();

        assert_eq!(queue.pop_front().unwrap().unwrap().session_id, "sess-1");
        assert_eq!(queue.pop_front().unwrap().unwrap().session_id, "sess-2");
        assert!(queue.pop_front().unwrap().is_none());
    }

    #[test]
    fn test_duplicate_fingerprint_dropped() {
        let dir = TempDir::new().unwrap();
        let queue = CaptureQueue::open(dir.path()).unwrap();

        assert!(queue
            .enqueue(CaptureJob::new("sess-1", PathBuf::from("/t/1.jsonl"), "repo"))
            .unwrap());
        assert!(!queue
            .enqueue(CaptureJob::new("sess-1", PathBuf::from("/t/1.jsonl"), "repo"))
            .unwrap());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let queue = CaptureQueue::open(dir.path()).unwrap();
            queue
                .enqueue(CaptureJob::new("sess-1", PathBuf::from("/t/1.jsonl"), "repo"))
                .unwrap();
        }
        let reopened = CaptureQueue::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.pop_front().unwrap().unwrap().session_id, "sess-1");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("sess-1"), fingerprint("sess-1"));
        assert_ne!(fingerprint("sess-1"), fingerprint("sess-2"));
        assert_eq!(fingerprint("sess-1").len(), 16);
    }
}
