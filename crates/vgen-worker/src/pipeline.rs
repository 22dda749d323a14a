//! Per-job processing: pickup, strategy, dispatch, download, audio, finalize.
//!
//! Progress is written at each stage boundary through a guarded transition.
//! That write doubles as the cancellation check: once the job has left
//! PROCESSING, or was retried into a later attempt, the checkpoint conflicts
//! and this attempt is abandoned.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, Instrument};
use vgen_models::{Job, JobStatus};
use vgen_providers::StrategyInput;
use vgen_queue::Delivery;
use vgen_store::{JobRepository, StoreError};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::finalizer::Finalizer;
use crate::logging::JobLogger;
use crate::metrics;

pub mod progress {
    pub const PICKED_UP: u8 = 10;
    pub const GENERATED: u8 = 80;
    pub const DOWNLOADED: u8 = 85;
    pub const AUDIO_DONE: u8 = 90;
    pub const UPLOADED: u8 = 95;
}

/// Record progress for the attempt `job` belongs to, turning a lost guard
/// into the matching abort.
pub(crate) async fn checkpoint(
    jobs: &JobRepository,
    job: &Job,
    progress: u8,
    log: &JobLogger,
) -> WorkerResult<Job> {
    match jobs.record_progress(&job.id, job.attempts, progress).await {
        Ok(job) => {
            log.log_progress(progress);
            Ok(job)
        }
        Err(e) => Err(abort_reason(e)),
    }
}

/// Map a conflict on a PROCESSING-guarded write to why the job is gone.
pub(crate) fn abort_reason(err: StoreError) -> WorkerError {
    match err {
        StoreError::Conflict {
            actual: JobStatus::Completed,
            ..
        } => WorkerError::Superseded,
        StoreError::Conflict { .. } | StoreError::InvalidTransition { .. } => {
            WorkerError::Cancelled
        }
        other => WorkerError::Store(other),
    }
}

pub struct JobPipeline {
    ctx: Arc<WorkerContext>,
    finalizer: Finalizer,
}

impl JobPipeline {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        let finalizer = Finalizer::new(
            ctx.jobs.clone(),
            Arc::clone(&ctx.videos),
            Arc::clone(&ctx.objects),
            Arc::clone(ctx.audio.muxer()),
        );
        Self { ctx, finalizer }
    }

    /// Run one delivery to COMPLETED.
    ///
    /// Errors are left for the caller to settle against the queue; the only
    /// terminal transition made here is the final completion.
    pub async fn process(&self, delivery: &Delivery) -> WorkerResult<Job> {
        let mut log = JobLogger::new(&delivery.job.job_id);
        let span = log.create_span();
        self.run(delivery, &mut log).instrument(span).await
    }

    async fn run(&self, delivery: &Delivery, log: &mut JobLogger) -> WorkerResult<Job> {
        let ctx = &self.ctx;
        let started = Instant::now();

        let job = self.pickup(delivery, log).await?;
        let id = job.id.clone();
        checkpoint(&ctx.jobs, &job, progress::PICKED_UP, log).await?;

        log.enter("strategy");
        let strategy = ctx.selector.select(&StrategyInput::for_job(&job));
        info!(
            job_id = %id,
            backend = %strategy.backend,
            budget = %strategy.budget,
            cost_cents = strategy.cost_cents,
            "Selected generation strategy"
        );
        let image = job
            .primary_image()
            .ok_or_else(|| WorkerError::validation("job has no source images"))?;

        log.enter("dispatch");
        let stage = Instant::now();
        let generated = ctx.dispatcher.dispatch(&strategy, image).await?;
        metrics::record_stage("dispatch", stage.elapsed());
        checkpoint(&ctx.jobs, &job, progress::GENERATED, log).await?;

        log.enter("download");
        let stage = Instant::now();
        let video = ctx.downloader.download(&generated.media_url).await?;
        metrics::record_stage("download", stage.elapsed());
        checkpoint(&ctx.jobs, &job, progress::DOWNLOADED, log).await?;

        log.enter("audio");
        let stage = Instant::now();
        let audio = ctx.audio.run(&job, video).await;
        metrics::record_stage("audio", stage.elapsed());
        if let crate::audio::AudioOutcome::Degraded { error, .. } = &audio {
            log.log_warning(&format!("continuing without audio: {}", error));
        }
        checkpoint(&ctx.jobs, &job, progress::AUDIO_DONE, log).await?;

        log.enter("finalize");
        let stage = Instant::now();
        let completed = self
            .finalizer
            .finalize(&job, &strategy, &generated, audio, log)
            .await?;
        metrics::record_stage("finalize", stage.elapsed());
        metrics::record_job_duration(started.elapsed());

        log.log_completion(&format!(
            "{} via {} ({} cents)",
            completed.result_ref.as_deref().unwrap_or_default(),
            generated.backend,
            completed.cost_cents
        ));
        Ok(completed)
    }

    /// Claim the job for this delivery, or explain why the delivery is stale.
    ///
    /// PENDING jobs are started. PROCESSING jobs are resumed, since the
    /// delivery may be a redelivery after a crash; the completion guard
    /// settles any duplicate work.
    async fn pickup(&self, delivery: &Delivery, log: &mut JobLogger) -> WorkerResult<Job> {
        let payload = &delivery.job;
        let jobs = &self.ctx.jobs;

        let Some(job) = jobs.get(&payload.job_id).await? else {
            return Err(WorkerError::stale("job no longer exists"));
        };
        if job.attempts != payload.attempt {
            return Err(WorkerError::stale(format!(
                "payload is for attempt {}, job is on attempt {}",
                payload.attempt, job.attempts
            )));
        }

        let job = match job.status {
            JobStatus::Pending => match jobs.start(&job.id).await {
                Ok(job) => job,
                Err(e) if e.is_conflict() => {
                    let current = jobs.require(&job.id).await?;
                    if current.status != JobStatus::Processing {
                        return Err(WorkerError::stale(format!("job is {}", current.status)));
                    }
                    current
                }
                Err(e) => return Err(e.into()),
            },
            JobStatus::Processing => {
                log.log_warning(&format!(
                    "resuming job already in progress (delivery {})",
                    payload.delivery
                ));
                job
            }
            JobStatus::Completed | JobStatus::Failed => {
                return Err(WorkerError::stale(format!("job is {}", job.status)));
            }
        };

        log.log_start(&format!(
            "{} for product {} (attempt {}, delivery {})",
            job.style, job.product_ref, job.attempts, payload.delivery
        ));
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::JobId;

    #[test]
    fn test_abort_reason() {
        let id = JobId::from_string("j");
        let superseded = abort_reason(StoreError::Conflict {
            id: id.clone(),
            expected: JobStatus::Processing,
            actual: JobStatus::Completed,
        });
        assert!(matches!(superseded, WorkerError::Superseded));

        let cancelled = abort_reason(StoreError::Conflict {
            id,
            expected: JobStatus::Processing,
            actual: JobStatus::Failed,
        });
        assert!(matches!(cancelled, WorkerError::Cancelled));

        let outage = abort_reason(StoreError::Unavailable("down".into()));
        assert!(outage.is_transient());
    }

    #[test]
    fn test_progress_checkpoints_increase() {
        let points = [
            progress::PICKED_UP,
            progress::GENERATED,
            progress::DOWNLOADED,
            progress::AUDIO_DONE,
            progress::UPLOADED,
        ];
        assert!(points.windows(2).all(|w| w[0] < w[1]));
    }
}
