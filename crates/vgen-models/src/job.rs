//! Job records and their status graph.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{Backend, JobSettings, VideoStyle};

/// Error message written when a user cancels a job.
pub const CANCELLED_MESSAGE: &str = "cancelled by user";

/// Error message written when the queue gives up redelivering a job.
pub const EXHAUSTED_MESSAGE: &str = "exhausted retries";

/// Error message written by the reconciliation sweep.
pub const STALLED_MESSAGE: &str = "stalled worker";

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Stored and waiting for a worker
    #[default]
    Pending,
    /// Owned by a worker
    Processing,
    /// Video produced and recorded
    Completed,
    /// Failed or cancelled; may be retried explicitly
    Failed,
}

impl JobStatus {
    pub const ALL: &'static [JobStatus] = &[
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Edges of the status graph. Self-edges are not transitions.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Pending)
        )
    }

    /// Whether the job has left the queue's hands (completed or failed).
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state change applied to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// PENDING -> PROCESSING
    Start,
    /// Checkpoint while PROCESSING; never lowers progress
    Progress(u8),
    /// PROCESSING -> COMPLETED
    Complete { result_ref: String, cost_cents: u32 },
    /// PENDING | PROCESSING -> FAILED
    Fail { message: String },
    /// PENDING | PROCESSING -> FAILED, marked as cancelled
    Cancel,
    /// FAILED -> PENDING
    Retry,
}

impl Transition {
    pub fn fail(message: impl Into<String>) -> Self {
        Transition::Fail {
            message: message.into(),
        }
    }

    pub fn exhausted() -> Self {
        Self::fail(EXHAUSTED_MESSAGE)
    }

    pub fn stalled() -> Self {
        Self::fail(STALLED_MESSAGE)
    }

    /// Status the job ends up in after this transition.
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Start | Transition::Progress(_) => JobStatus::Processing,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail { .. } | Transition::Cancel => JobStatus::Failed,
            Transition::Retry => JobStatus::Pending,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Progress(_) => "progress",
            Transition::Complete { .. } => "complete",
            Transition::Fail { .. } => "fail",
            Transition::Cancel => "cancel",
            Transition::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job status is {actual}, expected {expected}")]
    StatusMismatch {
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("cannot {transition} a job in status {from}")]
    Illegal {
        transition: &'static str,
        from: JobStatus,
    },
}

/// One request to produce a marketing video for a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,

    /// Catalog item the video is for
    pub product_ref: String,

    /// Owning project
    pub project_ref: String,

    pub style: VideoStyle,

    /// Explicit backend choice; `None` lets the budget policy decide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<Backend>,

    #[serde(default)]
    pub settings: JobSettings,

    /// Product image references captured at submission
    #[serde(default)]
    pub source_images: Vec<String>,

    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Number of explicit retries
    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Durable location of the produced media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,

    /// Accumulated cost in US cents (generation plus audio)
    #[serde(default)]
    pub cost_cents: u32,

    /// Set when the failure was a user cancellation
    #[serde(default)]
    pub cancelled: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency counter, bumped on every write
    #[serde(default)]
    pub version: u64,
}

impl Job {
    pub fn new(
        product_ref: impl Into<String>,
        project_ref: impl Into<String>,
        style: VideoStyle,
        settings: JobSettings,
        source_images: Vec<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: JobId::new(),
            product_ref: product_ref.into(),
            project_ref: project_ref.into(),
            style,
            model_preference: None,
            settings,
            source_images,
            status: JobStatus::Pending,
            progress: 0,
            attempts: 0,
            error_message: None,
            result_ref: None,
            cost_cents: 0,
            cancelled: false,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            version: 0,
        }
    }

    pub fn with_model_preference(mut self, backend: Backend) -> Self {
        self.model_preference = Some(backend);
        self
    }

    /// Primary image handed to the generation backend.
    pub fn primary_image(&self) -> Option<&str> {
        self.source_images.first().map(String::as_str)
    }

    /// COMPLETED, or FAILED by cancellation. No automatic transition leaves these.
    pub fn is_terminal(&self) -> bool {
        self.status == JobStatus::Completed || (self.status == JobStatus::Failed && self.cancelled)
    }

    /// PROCESSING with no write for longer than `threshold`.
    pub fn is_stalled(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Processing && now - self.updated_at > threshold
    }

    /// Apply a transition in place, keeping the record invariants:
    /// `result_ref` is set iff COMPLETED, `error_message` is set iff FAILED,
    /// and progress never decreases except when a retry resets it to 0.
    pub fn apply(&mut self, transition: &Transition) -> Result<(), TransitionError> {
        let legal = match transition {
            Transition::Progress(_) => self.status == JobStatus::Processing,
            other => self.status.can_transition_to(other.target()),
        };
        if !legal {
            return Err(TransitionError::Illegal {
                transition: transition.name(),
                from: self.status,
            });
        }

        let now = Utc::now();
        match transition {
            Transition::Start => {
                self.started_at = Some(now);
            }
            Transition::Progress(p) => {
                self.progress = self.progress.max((*p).min(100));
            }
            Transition::Complete {
                result_ref,
                cost_cents,
            } => {
                self.result_ref = Some(result_ref.clone());
                self.cost_cents = *cost_cents;
                self.progress = 100;
                self.completed_at = Some(now);
            }
            Transition::Fail { message } => {
                self.error_message = Some(message.clone());
                self.completed_at = Some(now);
            }
            Transition::Cancel => {
                self.error_message = Some(CANCELLED_MESSAGE.to_string());
                self.cancelled = true;
                self.completed_at = Some(now);
            }
            Transition::Retry => {
                self.attempts += 1;
                self.progress = 0;
                self.error_message = None;
                self.result_ref = None;
                self.cost_cents = 0;
                self.cancelled = false;
                self.started_at = None;
                self.completed_at = None;
            }
        }

        self.status = transition.target();
        self.updated_at = now;
        Ok(())
    }

    /// Compare-and-set flavour of `apply`: fails with `StatusMismatch`
    /// unless the job is currently in `expected`.
    pub fn apply_from(
        &mut self,
        expected: JobStatus,
        transition: &Transition,
    ) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::StatusMismatch {
                expected,
                actual: self.status,
            });
        }
        self.apply(transition)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            attempts: self.attempts,
            result_ref: self.result_ref.clone(),
            error_message: self.error_message.clone(),
            cost_cents: self.cost_cents,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only projection served to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub cost_cents: u32,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            "prod-1",
            "proj-1",
            VideoStyle::Testimonial,
            JobSettings::default(),
            vec!["https://cdn.example.com/p1.jpg".to_string()],
        )
    }

    #[test]
    fn test_job_creation() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.primary_image(), Some("https://cdn.example.com/p1.jpg"));
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        job.apply(&Transition::Start).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());

        job.apply(&Transition::Progress(80)).unwrap();
        job.apply(&Transition::Complete {
            result_ref: "https://media.example.com/v.mp4".into(),
            cost_cents: 505,
        })
        .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.cost_cents, 505);
        assert!(job.result_ref.is_some());
        assert!(job.error_message.is_none());
        assert!(job.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = job();
        job.apply(&Transition::Start).unwrap();
        job.apply(&Transition::Progress(80)).unwrap();
        job.apply(&Transition::Progress(10)).unwrap();
        assert_eq!(job.progress, 80);
        job.apply(&Transition::Progress(250)).unwrap();
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_progress_requires_processing() {
        let mut job = job();
        let err = job.apply(&Transition::Progress(10)).unwrap_err();
        assert!(matches!(err, TransitionError::Illegal { .. }));
    }

    #[test]
    fn test_cancel_from_pending() {
        let mut job = job();
        job.apply(&Transition::Cancel).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(job.is_terminal());
    }

    #[test]
    fn test_cannot_cancel_completed() {
        let mut job = job();
        job.apply(&Transition::Start).unwrap();
        job.apply(&Transition::Complete {
            result_ref: "r".into(),
            cost_cents: 0,
        })
        .unwrap();
        assert!(job.apply(&Transition::Cancel).is_err());
        assert!(job.apply(&Transition::Retry).is_err());
    }

    #[test]
    fn test_retry_resets_state() {
        let mut job = job();
        job.apply(&Transition::Start).unwrap();
        job.apply(&Transition::Progress(80)).unwrap();
        job.apply(&Transition::fail("provider exploded")).unwrap();
        assert!(!job.is_terminal());

        job.apply(&Transition::Retry).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.attempts, 1);
        assert!(job.error_message.is_none());
        assert!(job.result_ref.is_none());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut job = job();
        assert!(job.apply(&Transition::Retry).is_err());
        job.apply(&Transition::Start).unwrap();
        assert!(job.apply(&Transition::Retry).is_err());
    }

    #[test]
    fn test_apply_from_detects_mismatch() {
        let mut job = job();
        let err = job
            .apply_from(JobStatus::Processing, &Transition::Progress(50))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::StatusMismatch {
                expected: JobStatus::Processing,
                actual: JobStatus::Pending,
            }
        );
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_status_graph() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Failed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_is_stalled() {
        let mut job = job();
        let now = Utc::now();
        assert!(!job.is_stalled(Duration::minutes(30), now));

        job.apply(&Transition::Start).unwrap();
        job.updated_at = now - Duration::minutes(45);
        assert!(job.is_stalled(Duration::minutes(30), now));
        assert!(!job.is_stalled(Duration::minutes(60), now));
    }

    #[test]
    fn test_serde_roundtrip_keeps_version() {
        let mut job = job();
        job.version = 7;
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
        assert!(json.contains("\"status\":\"pending\""));
    }
}
