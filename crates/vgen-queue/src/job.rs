//! Queue payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vgen_models::{Job, JobId};

fn default_delivery() -> u32 {
    1
}

/// Payload enqueued for every video generation request.
///
/// The job store stays the source of truth; the payload only carries enough
/// to find the job and to count deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateVideoJob {
    pub job_id: JobId,
    pub product_ref: String,
    pub project_ref: String,
    /// Job retry generation this payload was enqueued for
    #[serde(default)]
    pub attempt: u32,
    /// 1-based delivery count, bumped on every backoff redelivery
    #[serde(default = "default_delivery")]
    pub delivery: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl GenerateVideoJob {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            product_ref: job.product_ref.clone(),
            project_ref: job.project_ref.clone(),
            attempt: job.attempts,
            delivery: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("generate:{}:{}", self.job_id, self.attempt)
    }

    /// Copy of this payload for the next delivery.
    pub fn redelivered(&self) -> Self {
        Self {
            delivery: self.delivery + 1,
            enqueued_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// A payload handed to one consumer, acknowledged by message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub job: GenerateVideoJob,
}

impl Delivery {
    pub fn new(message_id: impl Into<String>, job: GenerateVideoJob) -> Self {
        Self {
            message_id: message_id.into(),
            job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{JobSettings, VideoStyle};

    #[test]
    fn test_idempotency_key_changes_with_attempt() {
        let mut job = Job::new(
            "p",
            "proj",
            VideoStyle::Rotation,
            JobSettings::default(),
            vec!["img".into()],
        );
        let first = GenerateVideoJob::for_job(&job).idempotency_key();
        job.attempts = 1;
        let second = GenerateVideoJob::for_job(&job).idempotency_key();
        assert_ne!(first, second);
        assert!(first.starts_with("generate:"));
    }

    #[test]
    fn test_redelivered_bumps_delivery() {
        let job = Job::new("p", "proj", VideoStyle::Rotation, JobSettings::default(), vec![]);
        let payload = GenerateVideoJob::for_job(&job);
        assert_eq!(payload.delivery, 1);
        let next = payload.redelivered();
        assert_eq!(next.delivery, 2);
        assert_eq!(next.job_id, payload.job_id);
    }

    #[test]
    fn test_missing_delivery_defaults_to_one() {
        let json = r#"{"job_id":"j1","product_ref":"p","project_ref":"x","enqueued_at":"2024-01-01T00:00:00Z"}"#;
        let payload: GenerateVideoJob = serde_json::from_str(json).unwrap();
        assert_eq!(payload.delivery, 1);
        assert_eq!(payload.attempt, 0);
    }
}
