//! Store error types.

use thiserror::Error;
use vgen_models::{JobId, JobStatus, TransitionError};
use vgen_queue::QueueError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad input; never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another writer moved the job first; re-check state before acting.
    #[error("Conflict on job {id}: status is {actual}, expected {expected}")]
    Conflict {
        id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Invalid transition on job {id}: {reason}")]
    InvalidTransition { id: JobId, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Concurrent writers kept bumping the version.
    #[error("Version contention on job {0}")]
    VersionContention(JobId),

    /// The job row was written but its payload could not be enqueued.
    #[error("Queue unavailable for job {job_id}: {message}")]
    QueueUnavailable { job_id: JobId, message: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Redis error: {0}")]
    Redis(redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn from_transition(id: &JobId, err: TransitionError) -> Self {
        match err {
            TransitionError::StatusMismatch { expected, actual } => Self::Conflict {
                id: id.clone(),
                expected,
                actual,
            },
            TransitionError::Illegal { .. } => Self::InvalidTransition {
                id: id.clone(),
                reason: err.to_string(),
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::InvalidTransition { .. }
        )
    }

    /// Infrastructure failures worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_)
            | StoreError::VersionContention(_)
            | StoreError::QueueUnavailable { .. } => true,
            StoreError::Queue(e) => e.is_unavailable(),
            StoreError::Redis(e) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_timeout()
            }
            _ => false,
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Redis(e)
        }
    }
}
