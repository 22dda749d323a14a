//! Background reconciliation of stalled jobs.
//!
//! A worker that crashes mid-job leaves its job PROCESSING with no further
//! writes. Once a job has been untouched for longer than the threshold it is
//! forced to FAILED with "stalled worker". A job whose current attempt already
//! recorded its Video crashed between the insert and the completion, so it is
//! completed from that row through the same guarded write the worker uses.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use vgen_models::{Job, Video, STALLED_MESSAGE};
use vgen_store::{JobRepository, StoreResult, VideoStore};

use crate::metrics;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stalled: u32,
    pub failed: u32,
    pub completed: u32,
}

pub struct StalledJobSweeper {
    jobs: JobRepository,
    videos: Arc<dyn VideoStore>,
    threshold: Duration,
    interval: Duration,
    enabled: bool,
}

impl StalledJobSweeper {
    pub fn new(
        jobs: JobRepository,
        videos: Arc<dyn VideoStore>,
        threshold: Duration,
        interval: Duration,
    ) -> Self {
        let enabled = std::env::var("ENABLE_STALL_SWEEP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            jobs,
            videos,
            threshold,
            interval,
            enabled,
        }
    }

    /// Run until the task is dropped.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Stalled job sweep is disabled");
            return;
        }

        info!(
            "Starting stalled job sweeper (interval: {:?}, threshold: {:?})",
            self.interval, self.threshold
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!("Stalled job sweep error: {}", e);
            }
        }
    }

    /// Run a single sweep.
    pub async fn sweep_once(&self) -> StoreResult<SweepReport> {
        let threshold =
            chrono::Duration::from_std(self.threshold).unwrap_or(chrono::Duration::MAX);
        let stalled = self.jobs.list_stalled(threshold).await?;

        let mut report = SweepReport::default();
        for job in stalled {
            report.stalled += 1;

            match self.videos.get_by_job(&job.id).await {
                Ok(Some(video)) if video.attempt == job.attempts => {
                    if self.complete_from(&job, &video).await {
                        report.completed += 1;
                    }
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(job_id = %job.id, "Failed to look up video for stalled job: {}", e);
                    continue;
                }
            }

            match self.jobs.force_fail(&job.id, STALLED_MESSAGE).await {
                Ok(Some(_)) => {
                    report.failed += 1;
                    warn!(
                        job_id = %job.id,
                        progress = job.progress,
                        updated_at = %job.updated_at,
                        "Failed stalled job"
                    );
                }
                // Finished while we were looking
                Ok(None) => {}
                Err(e) => {
                    error!(job_id = %job.id, "Failed to fail stalled job: {}", e);
                }
            }
        }

        if report.stalled > 0 {
            metrics::record_jobs_stalled(u64::from(report.failed));
            info!(
                "Stalled job sweep complete: {} stalled, {} failed, {} completed",
                report.stalled, report.failed, report.completed
            );
        }

        Ok(report)
    }

    async fn complete_from(&self, job: &Job, video: &Video) -> bool {
        match self
            .jobs
            .complete(&job.id, job.attempts, &video.media_ref, video.metadata.cost_cents)
            .await
        {
            Ok(_) => {
                info!(job_id = %job.id, video_id = %video.id, "Completed stalled job from its video");
                true
            }
            Err(e) => {
                warn!(job_id = %job.id, video_id = %video.id, error = %e, "Could not complete stalled job");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{AspectRatio, Backend, JobSettings, JobStatus, VideoMetadata, VideoStyle};
    use vgen_store::MemoryStore;

    fn sweeper(store: &Arc<MemoryStore>, threshold: Duration) -> StalledJobSweeper {
        StalledJobSweeper {
            jobs: JobRepository::new(store.clone()),
            videos: store.clone(),
            threshold,
            interval: Duration::from_secs(60),
            enabled: true,
        }
    }

    async fn processing_job(jobs: &JobRepository) -> Job {
        let job = Job::new(
            "prod-1",
            "proj-1",
            VideoStyle::Rotation,
            JobSettings::default(),
            vec!["https://cdn.example.com/p.jpg".into()],
        );
        let job = jobs.create(job).await.unwrap();
        jobs.start(&job.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_fails_stalled_job_without_video() {
        let store = Arc::new(MemoryStore::new());
        let sweeper = sweeper(&store, Duration::ZERO);
        let job = processing_job(&sweeper.jobs).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.stalled, 1);
        assert_eq!(report.failed, 1);

        let job = sweeper.jobs.require(&job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(STALLED_MESSAGE));
    }

    fn video_for(job: &Job) -> Video {
        Video::new(
            job.id.clone(),
            "prod-1",
            "proj-1",
            "memory://videos/a.mp4",
            "videos/a.mp4",
            3,
            Some(5.0),
            VideoMetadata {
                backend: Backend::Luma,
                model: Backend::Luma.model().into(),
                has_audio: false,
                source_url: "https://provider.example.com/a.mp4".into(),
                cost_cents: 200,
                style: VideoStyle::Rotation,
                aspect_ratio: AspectRatio::Square,
                voice: None,
            },
        )
        .with_attempt(job.attempts)
    }

    #[tokio::test]
    async fn test_completes_stalled_job_with_video() {
        let store = Arc::new(MemoryStore::new());
        let sweeper = sweeper(&store, Duration::ZERO);
        let job = processing_job(&sweeper.jobs).await;
        store.insert_if_absent(video_for(&job)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 0);

        let job = sweeper.jobs.require(&job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_ref.as_deref(), Some("memory://videos/a.mp4"));
        assert_eq!(job.cost_cents, 200);

        // Nothing left for the next sweep
        assert_eq!(sweeper.sweep_once().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_video_from_earlier_attempt_does_not_complete() {
        let store = Arc::new(MemoryStore::new());
        let sweeper = sweeper(&store, Duration::ZERO);
        let job = processing_job(&sweeper.jobs).await;
        store.insert_if_absent(video_for(&job)).await.unwrap();
        sweeper.jobs.cancel(&job.id).await.unwrap();
        sweeper.jobs.retry(&job.id).await.unwrap();
        sweeper.jobs.start(&job.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 1);
        let job = sweeper.jobs.require(&job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(STALLED_MESSAGE));
    }

    #[tokio::test]
    async fn test_recent_jobs_are_not_stalled() {
        let store = Arc::new(MemoryStore::new());
        let sweeper = sweeper(&store, Duration::from_secs(1800));
        processing_job(&sweeper.jobs).await;

        assert_eq!(sweeper.sweep_once().await.unwrap(), SweepReport::default());
    }
}
