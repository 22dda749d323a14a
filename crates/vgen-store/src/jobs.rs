//! Guarded job transitions.
//!
//! Every write is read, apply, then compare-and-set on the stored version.
//! A version race re-reads and re-evaluates the status guard, so a status
//! that moved underneath the caller surfaces as `StoreError::Conflict`
//! instead of being overwritten.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use vgen_models::{Job, JobId, JobStatus, Transition};

use crate::backend::JobStore;
use crate::error::{StoreError, StoreResult};

const DEFAULT_CAS_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn JobStore>,
    cas_retries: u32,
}

impl JobRepository {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            cas_retries: DEFAULT_CAS_RETRIES,
        }
    }

    /// Persist a new PENDING job. Jobs without source images are rejected.
    pub async fn create(&self, job: Job) -> StoreResult<Job> {
        if job.source_images.iter().all(|img| img.trim().is_empty()) {
            return Err(StoreError::validation("product has no source images"));
        }
        if job.status != JobStatus::Pending {
            return Err(StoreError::validation("new jobs must be pending"));
        }

        self.store.insert(&job).await?;
        info!(job_id = %job.id, style = %job.style, "Created job");
        Ok(job)
    }

    pub async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        self.store.get(id).await
    }

    pub async fn require(&self, id: &JobId) -> StoreResult<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("job {}", id)))
    }

    /// Compare-and-set: apply `transition` only if the job is in `from`.
    pub async fn transition(
        &self,
        id: &JobId,
        from: JobStatus,
        transition: Transition,
    ) -> StoreResult<Job> {
        self.write(id, &transition, |_| Some(from)).await
    }

    /// PENDING -> PROCESSING.
    pub async fn start(&self, id: &JobId) -> StoreResult<Job> {
        self.transition(id, JobStatus::Pending, Transition::Start)
            .await
    }

    /// Progress checkpoint for `attempt`. Fails with `Conflict` once the job
    /// left PROCESSING or was retried into a later attempt.
    pub async fn record_progress(&self, id: &JobId, attempt: u32, progress: u8) -> StoreResult<Job> {
        self.write(id, &Transition::Progress(progress), |job| {
            processing_attempt(job, attempt)
        })
        .await
    }

    /// PROCESSING -> COMPLETED for `attempt`. The first caller wins; later
    /// callers and callers on a stale attempt get `Conflict`.
    pub async fn complete(
        &self,
        id: &JobId,
        attempt: u32,
        result_ref: impl Into<String>,
        cost_cents: u32,
    ) -> StoreResult<Job> {
        let transition = Transition::Complete {
            result_ref: result_ref.into(),
            cost_cents,
        };
        self.write(id, &transition, |job| processing_attempt(job, attempt))
            .await
    }

    /// PENDING | PROCESSING -> FAILED by user request.
    pub async fn cancel(&self, id: &JobId) -> StoreResult<Job> {
        let job = self
            .write(id, &Transition::Cancel, |job| Some(job.status))
            .await?;
        info!(job_id = %id, "Cancelled job");
        Ok(job)
    }

    /// FAILED -> PENDING, bumping `attempts` and clearing the failure.
    pub async fn retry(&self, id: &JobId) -> StoreResult<Job> {
        let job = self
            .transition(id, JobStatus::Failed, Transition::Retry)
            .await?;
        info!(job_id = %id, attempts = job.attempts, "Reset job for retry");
        Ok(job)
    }

    /// Fail the job from whatever unfinished status it is in.
    /// Returns `None` when the job already finished.
    pub async fn force_fail(&self, id: &JobId, message: &str) -> StoreResult<Option<Job>> {
        let transition = Transition::fail(message);
        match self
            .write(id, &transition, |job| {
                (!job.status.is_finished()).then_some(job.status)
            })
            .await
        {
            Ok(job) => Ok(Some(job)),
            Err(StoreError::Conflict { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        self.store.list_by_status(status).await
    }

    /// PROCESSING jobs with no write for longer than `threshold`.
    pub async fn list_stalled(&self, threshold: chrono::Duration) -> StoreResult<Vec<Job>> {
        let now = Utc::now();
        Ok(self
            .store
            .list_by_status(JobStatus::Processing)
            .await?
            .into_iter()
            .filter(|job| job.is_stalled(threshold, now))
            .collect())
    }

    /// Delete the project's COMPLETED jobs. Video rows are kept.
    pub async fn clear_completed(&self, project_ref: &str) -> StoreResult<usize> {
        let mut removed = 0;
        for job in self.store.list_by_status(JobStatus::Completed).await? {
            if job.project_ref == project_ref && self.store.delete(&job.id).await? {
                removed += 1;
            }
        }
        info!(project_ref, removed, "Cleared completed jobs");
        Ok(removed)
    }

    /// Read, guard, apply, CAS. `expected` returns the status the write is
    /// allowed from, or `None` to refuse outright.
    async fn write<F>(&self, id: &JobId, transition: &Transition, expected: F) -> StoreResult<Job>
    where
        F: Fn(&Job) -> Option<JobStatus> + Send + Sync,
    {
        for _ in 0..=self.cas_retries {
            let current = self.require(id).await?;
            let Some(from) = expected(&current) else {
                return Err(StoreError::Conflict {
                    id: id.clone(),
                    expected: transition_source(transition),
                    actual: current.status,
                });
            };

            let mut next = current.clone();
            next.apply_from(from, transition)
                .map_err(|e| StoreError::from_transition(id, e))?;
            next.version = current.version + 1;

            if self.store.replace(&next, current.version).await? {
                debug!(
                    job_id = %id,
                    transition = transition.name(),
                    status = %next.status,
                    version = next.version,
                    "Job updated"
                );
                return Ok(next);
            }
            debug!(job_id = %id, "Version race, re-reading job");
        }

        Err(StoreError::VersionContention(id.clone()))
    }
}

/// Guard for worker writes: the job is PROCESSING on the caller's attempt.
fn processing_attempt(job: &Job, attempt: u32) -> Option<JobStatus> {
    (job.attempts == attempt).then_some(JobStatus::Processing)
}

/// Nominal source status of a transition, for error reporting.
fn transition_source(transition: &Transition) -> JobStatus {
    match transition {
        Transition::Start | Transition::Cancel => JobStatus::Pending,
        Transition::Progress(_) | Transition::Complete { .. } | Transition::Fail { .. } => {
            JobStatus::Processing
        }
        Transition::Retry => JobStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use vgen_models::{JobSettings, VideoStyle, CANCELLED_MESSAGE};

    fn repo() -> (JobRepository, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (JobRepository::new(store.clone()), store)
    }

    fn new_job() -> Job {
        Job::new(
            "prod-1",
            "proj-1",
            VideoStyle::Rotation,
            JobSettings::default(),
            vec!["https://cdn.example.com/a.jpg".into()],
        )
    }

    #[tokio::test]
    async fn test_create_requires_images() {
        let (repo, _) = repo();
        let mut job = new_job();
        job.source_images.clear();
        let err = repo.create(job).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let (repo, _) = repo();
        let job = repo.create(new_job()).await.unwrap();

        let started = repo.start(&job.id).await.unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert_eq!(started.version, 1);

        let err = repo.start(&job.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: JobStatus::Pending,
                actual: JobStatus::Processing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_only_one_completion_wins() {
        let (repo, _) = repo();
        let job = repo.create(new_job()).await.unwrap();
        repo.start(&job.id).await.unwrap();

        let (a, b) = tokio::join!(
            repo.complete(&job.id, 0, "s3://a", 100),
            repo.complete(&job.id, 0, "s3://b", 100)
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let stored = repo.require(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_pending_and_processing() {
        let (repo, _) = repo();
        let pending = repo.create(new_job()).await.unwrap();
        let cancelled = repo.cancel(&pending.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Failed);
        assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_MESSAGE));

        let running = repo.create(new_job()).await.unwrap();
        repo.start(&running.id).await.unwrap();
        tokio_test::assert_ok!(repo.cancel(&running.id).await);

        assert!(repo.cancel(&running.id).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_progress_after_cancel_conflicts() {
        let (repo, _) = repo();
        let job = repo.create(new_job()).await.unwrap();
        repo.start(&job.id).await.unwrap();
        repo.cancel(&job.id).await.unwrap();

        let err = repo.record_progress(&job.id, 0, 80).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_writes_from_earlier_attempt_conflict() {
        let (repo, _) = repo();
        let job = repo.create(new_job()).await.unwrap();
        repo.start(&job.id).await.unwrap();
        repo.cancel(&job.id).await.unwrap();
        repo.retry(&job.id).await.unwrap();
        repo.start(&job.id).await.unwrap();

        let err = repo.record_progress(&job.id, 0, 80).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                actual: JobStatus::Processing,
                ..
            }
        ));
        assert!(repo
            .complete(&job.id, 0, "s3://stale", 100)
            .await
            .unwrap_err()
            .is_conflict());

        let current = repo.record_progress(&job.id, 1, 80).await.unwrap();
        assert_eq!(current.progress, 80);
        assert!(current.result_ref.is_none());
    }

    #[tokio::test]
    async fn test_retry_resets_and_counts() {
        let (repo, _) = repo();
        let job = repo.create(new_job()).await.unwrap();
        repo.start(&job.id).await.unwrap();
        repo.record_progress(&job.id, 0, 80).await.unwrap();
        repo.force_fail(&job.id, "provider down").await.unwrap();

        let retried = repo.retry(&job.id).await.unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.progress, 0);
        assert_eq!(retried.attempts, 1);
        assert!(retried.error_message.is_none());
    }

    #[tokio::test]
    async fn test_force_fail_skips_finished_jobs() {
        let (repo, _) = repo();
        let job = repo.create(new_job()).await.unwrap();
        repo.start(&job.id).await.unwrap();
        repo.complete(&job.id, 0, "s3://done", 0).await.unwrap();

        assert!(repo.force_fail(&job.id, "late").await.unwrap().is_none());
        assert_eq!(
            repo.require(&job.id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_list_stalled() {
        let (repo, store) = repo();
        let job = repo.create(new_job()).await.unwrap();
        let mut started = repo.start(&job.id).await.unwrap();

        assert!(repo
            .list_stalled(chrono::Duration::minutes(30))
            .await
            .unwrap()
            .is_empty());

        let version = started.version;
        started.updated_at = Utc::now() - chrono::Duration::hours(1);
        started.version += 1;
        assert!(store.replace(&started, version).await.unwrap());

        let stalled = repo.list_stalled(chrono::Duration::minutes(30)).await.unwrap();
        assert_eq!(stalled.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_completed_only_touches_project() {
        let (repo, _) = repo();
        let a = repo.create(new_job()).await.unwrap();
        repo.start(&a.id).await.unwrap();
        repo.complete(&a.id, 0, "s3://a", 0).await.unwrap();

        let mut other = new_job();
        other.project_ref = "proj-2".into();
        let b = repo.create(other).await.unwrap();
        repo.start(&b.id).await.unwrap();
        repo.complete(&b.id, 0, "s3://b", 0).await.unwrap();

        assert_eq!(repo.clear_completed("proj-1").await.unwrap(), 1);
        assert!(repo.get(&a.id).await.unwrap().is_none());
        assert!(repo.get(&b.id).await.unwrap().is_some());
    }
}
