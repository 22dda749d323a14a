//! Upload, record the Video, complete the job.
//!
//! The Video row is keyed by job id and inserted only if absent, and the
//! completion is a guarded PROCESSING -> COMPLETED write on the job's
//! attempt. Two workers racing on one job therefore end with one Video row
//! and one completion; the loser deletes the object it uploaded. A row whose
//! job was cancelled before completion is removed again, and a row left by
//! an earlier attempt is replaced by the current one.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use vgen_media::Muxer;
use vgen_models::{Job, Video, VideoMetadata};
use vgen_providers::{DispatchResult, Strategy};
use vgen_storage::{video_key, ObjectStore, StoredObject};
use vgen_store::{JobRepository, VideoInsert, VideoStore};

use crate::audio::AudioOutcome;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::pipeline::{abort_reason, checkpoint, progress};

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

pub struct Finalizer {
    jobs: JobRepository,
    videos: Arc<dyn VideoStore>,
    objects: Arc<dyn ObjectStore>,
    muxer: Arc<dyn Muxer>,
}

impl Finalizer {
    pub fn new(
        jobs: JobRepository,
        videos: Arc<dyn VideoStore>,
        objects: Arc<dyn ObjectStore>,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        Self {
            jobs,
            videos,
            objects,
            muxer,
        }
    }

    pub async fn finalize(
        &self,
        job: &Job,
        strategy: &Strategy,
        generated: &DispatchResult,
        audio: AudioOutcome,
        log: &JobLogger,
    ) -> WorkerResult<Job> {
        let has_audio = audio.has_audio();
        let voice = audio.voice().cloned();
        let cost_cents = generated.cost_cents + audio.cost_cents();

        let bytes = audio.into_video();
        let duration_seconds = self.measure(job, strategy, &bytes).await;

        let key = video_key(&job.project_ref, &job.product_ref, job.id.as_str(), Utc::now());
        let stored = self
            .objects
            .upload_bytes(&key, bytes, VIDEO_CONTENT_TYPE)
            .await?;
        info!(job_id = %job.id, key = %stored.key, size_bytes = stored.size_bytes, "Uploaded video");

        if let Err(e) = checkpoint(&self.jobs, job, progress::UPLOADED, log).await {
            self.discard(job, &stored).await;
            return Err(e);
        }

        let candidate = Video::new(
            job.id.clone(),
            &job.product_ref,
            &job.project_ref,
            &stored.url,
            &stored.key,
            stored.size_bytes,
            Some(duration_seconds),
            VideoMetadata {
                backend: generated.backend,
                model: generated.model.clone(),
                has_audio,
                source_url: generated.media_url.clone(),
                cost_cents,
                style: job.style,
                aspect_ratio: strategy.aspect_ratio,
                voice,
            },
        )
        .with_attempt(job.attempts);

        let inserted = match self.record(job, candidate, log).await {
            Ok(inserted) => inserted,
            Err(e) => {
                self.discard(job, &stored).await;
                return Err(e);
            }
        };

        let created = inserted.created();
        if !created {
            log.log_warning("video already recorded by another worker, discarding upload");
            self.discard(job, &stored).await;
        }

        let video = inserted.into_video();
        let completed = match self
            .jobs
            .complete(&job.id, job.attempts, &video.media_ref, video.metadata.cost_cents)
            .await
        {
            Ok(completed) => completed,
            Err(e) => {
                let reason = abort_reason(e);
                if created && matches!(reason, WorkerError::Cancelled) {
                    self.withdraw(job, &video, &stored).await;
                }
                return Err(reason);
            }
        };

        info!(
            job_id = %job.id,
            video_id = %video.id,
            has_audio = video.metadata.has_audio,
            duration_seconds = ?video.duration_seconds,
            cost_cents = completed.cost_cents,
            "Job finalized"
        );
        Ok(completed)
    }

    /// Length of the file being uploaded. A muxed file ends with its
    /// shorter input, and providers do not always honour the request.
    async fn measure(&self, job: &Job, strategy: &Strategy, video: &[u8]) -> f64 {
        let requested = f64::from(strategy.duration_seconds);
        match self.muxer.duration(video).await {
            Ok(secs) if secs > 0.0 => secs,
            Ok(_) => requested,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Cannot read final video duration, recording requested duration");
                requested
            }
        }
    }

    /// Insert `candidate`, replacing a row an earlier attempt of this job
    /// left behind.
    async fn record(
        &self,
        job: &Job,
        candidate: Video,
        log: &JobLogger,
    ) -> WorkerResult<VideoInsert> {
        let inserted = self.videos.insert_if_absent(candidate.clone()).await?;
        if !matches!(&inserted, VideoInsert::Existing(existing) if existing.attempt < job.attempts) {
            return Ok(inserted);
        }
        let leftover = inserted.into_video();

        log.log_warning(&format!(
            "replacing video left by attempt {}",
            leftover.attempt
        ));
        if self.videos.remove(&job.id, &leftover.id).await? {
            self.delete_object(&leftover.storage_key).await;
        }
        Ok(self.videos.insert_if_absent(candidate).await?)
    }

    /// Undo this call's row and upload after the job was cancelled under it.
    async fn withdraw(&self, job: &Job, video: &Video, stored: &StoredObject) {
        match self.videos.remove(&job.id, &video.id).await {
            Ok(true) => {
                info!(job_id = %job.id, video_id = %video.id, "Removed video of cancelled job");
                self.discard(job, stored).await;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(job_id = %job.id, video_id = %video.id, error = %e, "Failed to remove video of cancelled job");
            }
        }
    }

    /// Best-effort removal of an upload that will not be referenced.
    ///
    /// Keys are timestamped, so two racers can land on the same key; an
    /// object the recorded Video points at is never deleted.
    async fn discard(&self, job: &Job, stored: &StoredObject) {
        match self.videos.get_by_job(&job.id).await {
            Ok(Some(video)) if video.storage_key == stored.key => return,
            Ok(_) => {}
            Err(e) => {
                warn!(key = %stored.key, error = %e, "Cannot confirm upload is orphaned, keeping it");
                return;
            }
        }
        self.delete_object(&stored.key).await;
    }

    async fn delete_object(&self, key: &str) {
        if let Err(e) = self.objects.delete(key).await {
            warn!(key = %key, error = %e, "Failed to delete orphaned upload");
        }
    }
}
