//! Worker error types.

use thiserror::Error;
use vgen_providers::GenerationError;
use vgen_queue::QueueError;
use vgen_storage::StorageError;
use vgen_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised while processing one delivery.
///
/// The variant decides what happens to the delivery: job-fatal errors fail
/// the job and acknowledge, transient errors go back to the queue with
/// backoff, and the rest acknowledge without touching the job.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The job was cancelled while the worker held it.
    #[error("Job was cancelled")]
    Cancelled,

    /// Another worker already finalized the job.
    #[error("Job was finalized by another worker")]
    Superseded,

    /// The queue entry no longer matches the job record.
    #[error("Stale delivery: {0}")]
    Stale(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkerError {
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn stale(msg: impl Into<String>) -> Self {
        Self::Stale(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Infrastructure failure: redeliver with backoff, the job stays PROCESSING.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_transient(),
            WorkerError::Queue(_) | WorkerError::Io(_) => true,
            _ => false,
        }
    }

    /// Fail the job now and acknowledge the delivery.
    pub fn is_job_fatal(&self) -> bool {
        match self {
            WorkerError::Generation(_)
            | WorkerError::Storage(_)
            | WorkerError::Download(_)
            | WorkerError::Validation(_)
            | WorkerError::Config(_) => true,
            WorkerError::Store(e) => !e.is_transient() && !e.is_conflict(),
            _ => false,
        }
    }

    /// Acknowledge without any further transition.
    pub fn is_benign(&self) -> bool {
        match self {
            WorkerError::Cancelled | WorkerError::Superseded | WorkerError::Stale(_) => true,
            WorkerError::Store(e) => e.is_conflict(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{Backend, JobId, JobStatus};

    #[test]
    fn test_generation_errors_are_fatal_and_keep_message() {
        let err = WorkerError::from(GenerationError::failed(Backend::Luma, "quota exceeded"));
        assert!(err.is_job_fatal());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "luma generation failed: quota exceeded");
    }

    #[test]
    fn test_store_outage_is_transient() {
        let err = WorkerError::from(StoreError::Unavailable("connection refused".into()));
        assert!(err.is_transient());
        assert!(!err.is_job_fatal());
    }

    #[test]
    fn test_lost_cas_is_benign() {
        let err = WorkerError::from(StoreError::Conflict {
            id: JobId::from_string("j"),
            expected: JobStatus::Processing,
            actual: JobStatus::Completed,
        });
        assert!(err.is_benign());
        assert!(!err.is_job_fatal());
        assert!(!err.is_transient());
        assert!(WorkerError::Cancelled.is_benign());
    }

    #[test]
    fn test_queue_errors_are_transient() {
        let err = WorkerError::from(QueueError::unavailable("down"));
        assert!(err.is_transient());
    }
}
