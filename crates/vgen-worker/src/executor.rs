//! Job executor.
//!
//! A fixed number of slots (semaphore permits) each carry one delivery at a
//! time from dequeue to settlement. Settlement decides what the queue does
//! with the delivery based on how processing ended.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vgen_models::EXHAUSTED_MESSAGE;
use vgen_queue::Delivery;

use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics::{self, names};
use crate::pipeline::JobPipeline;
use crate::rate_limit::JobRateLimiter;

/// How often due redeliveries are moved back to the ready queue.
const PROMOTE_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after a failed poll before trying again.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Completed,
    /// The job was marked FAILED.
    Failed,
    /// Acknowledged without a transition: cancelled, superseded or stale.
    Skipped,
    Retrying(Duration),
    DeadLettered,
}

/// Runs a delivery through the pipeline and settles it with the queue.
pub struct DeliveryHandler {
    ctx: Arc<WorkerContext>,
    pipeline: JobPipeline,
    limiter: JobRateLimiter,
}

impl DeliveryHandler {
    pub fn new(ctx: Arc<WorkerContext>, limiter: JobRateLimiter) -> Self {
        Self {
            pipeline: JobPipeline::new(Arc::clone(&ctx)),
            ctx,
            limiter,
        }
    }

    pub async fn handle(&self, delivery: Delivery) -> DeliveryOutcome {
        self.limiter.acquire().await;
        metrics::increment(names::JOBS_STARTED_TOTAL);

        let result = self.pipeline.process(&delivery).await;
        self.settle(&delivery, result).await
    }

    async fn settle(
        &self,
        delivery: &Delivery,
        result: WorkerResult<vgen_models::Job>,
    ) -> DeliveryOutcome {
        let job_id = &delivery.job.job_id;

        let err = match result {
            Ok(_) => {
                metrics::increment(names::JOBS_COMPLETED_TOTAL);
                self.ack(delivery).await;
                return DeliveryOutcome::Completed;
            }
            Err(err) => err,
        };

        if err.is_benign() {
            match &err {
                WorkerError::Cancelled => {
                    info!(job_id = %job_id, "Job left PROCESSING while running, dropping work");
                    metrics::increment(names::JOBS_CANCELLED_TOTAL);
                }
                WorkerError::Superseded => {
                    info!(job_id = %job_id, "Job finalized by another worker");
                }
                other => debug!(job_id = %job_id, reason = %other, "Skipping delivery"),
            }
            self.ack(delivery).await;
            return DeliveryOutcome::Skipped;
        }

        if err.is_transient() {
            return self.redeliver(delivery, &err).await;
        }

        let message = err.to_string();
        error!(job_id = %job_id, error = %message, "Job failed");
        match self.ctx.jobs.force_fail(job_id, &message).await {
            Ok(Some(_)) => {
                metrics::increment(names::JOBS_FAILED_TOTAL);
                self.ack(delivery).await;
                DeliveryOutcome::Failed
            }
            Ok(None) => {
                self.ack(delivery).await;
                DeliveryOutcome::Skipped
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not record failure");
                self.redeliver(delivery, &WorkerError::Store(e)).await
            }
        }
    }

    /// Back to the queue with backoff, or to the dead-letter queue once
    /// deliveries are exhausted.
    async fn redeliver(&self, delivery: &Delivery, err: &WorkerError) -> DeliveryOutcome {
        let job_id = &delivery.job.job_id;
        let attempt = delivery.job.delivery;
        let backoff = &self.ctx.backoff;

        if backoff.should_dead_letter(attempt) {
            let reason = format!("{} after {} deliveries: {}", EXHAUSTED_MESSAGE, attempt, err);
            if let Err(e) = self.ctx.queue.dead_letter(delivery, &reason).await {
                error!(job_id = %job_id, error = %e, "Failed to dead-letter delivery");
            }
            match self.ctx.jobs.force_fail(job_id, EXHAUSTED_MESSAGE).await {
                Ok(_) => {}
                Err(e) => error!(job_id = %job_id, error = %e, "Failed to mark exhausted job"),
            }
            metrics::increment(names::JOBS_DEAD_LETTERED_TOTAL);
            return DeliveryOutcome::DeadLettered;
        }

        let delay = backoff.delay_for(attempt);
        warn!(
            job_id = %job_id,
            delivery = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, scheduling redelivery"
        );
        if let Err(e) = self.ctx.queue.retry_later(delivery, delay).await {
            error!(job_id = %job_id, error = %e, "Failed to schedule redelivery");
        }
        metrics::increment(names::DELIVERIES_RETRIED_TOTAL);
        DeliveryOutcome::Retrying(delay)
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.ctx.queue.ack(delivery).await {
            warn!(
                job_id = %delivery.job.job_id,
                message_id = %delivery.message_id,
                error = %e,
                "Failed to acknowledge delivery"
            );
        }
    }
}

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<WorkerContext>,
    handler: Arc<DeliveryHandler>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, ctx: Arc<WorkerContext>) -> Self {
        let limiter = JobRateLimiter::new(config.rate_limit_max, config.rate_limit_window);
        let handler = Arc::new(DeliveryHandler::new(Arc::clone(&ctx), limiter));
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = config
            .consumer_name
            .clone()
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));

        Self {
            config,
            ctx,
            handler,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Process one delivery inline, outside the pool.
    pub async fn execute(&self, delivery: Delivery) -> DeliveryOutcome {
        self.handler.handle(delivery).await
    }

    /// Start the executor. Returns after shutdown once in-flight jobs drained
    /// or the shutdown timeout passed.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs, {} jobs per {}s",
            self.consumer_name,
            self.config.max_concurrent_jobs,
            self.config.rate_limit_max,
            self.config.rate_limit_window.as_secs()
        );

        let maintenance = self.spawn_maintenance();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        }

        maintenance.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "Shutdown timeout reached with {} jobs still running",
                self.in_flight()
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent_jobs - self.job_semaphore.available_permits()
    }

    /// One poll: honour the pause flag, take a slot, dequeue, hand off.
    async fn consume_once(&self) -> WorkerResult<()> {
        if self.ctx.control.is_paused().await? {
            metrics::set_paused(true);
            debug!("System paused, not dequeuing");
            tokio::time::sleep(self.config.pause_poll).await;
            return Ok(());
        }
        metrics::set_paused(false);

        let permit = Arc::clone(&self.job_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::config("job semaphore closed"))?;

        let deliveries = self
            .ctx
            .queue
            .dequeue(&self.consumer_name, self.config.poll_block, 1)
            .await?;

        if let Some(delivery) = deliveries.into_iter().next() {
            debug!(
                job_id = %delivery.job.job_id,
                message_id = %delivery.message_id,
                "Dequeued delivery"
            );
            self.spawn_job(delivery, permit);
        }
        Ok(())
    }

    fn spawn_job(&self, delivery: Delivery, permit: tokio::sync::OwnedSemaphorePermit) {
        let handler = Arc::clone(&self.handler);
        let semaphore = Arc::clone(&self.job_semaphore);
        let max = self.config.max_concurrent_jobs;

        metrics::set_in_flight(max - semaphore.available_permits());
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = handler.handle(delivery).await;
            debug!(outcome = ?outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Delivery settled");
            drop(permit);
            metrics::set_in_flight(max - semaphore.available_permits());
        });
    }

    /// Periodically promote due redeliveries and claim deliveries abandoned
    /// by crashed consumers.
    fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let handler = Arc::clone(&self.handler);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let claim_min_idle = self.config.claim_min_idle;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut promote = tokio::time::interval(PROMOTE_INTERVAL);
            let mut claim = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = promote.tick() => {
                        if let Err(e) = ctx.queue.promote_due().await {
                            warn!("Failed to promote delayed jobs: {}", e);
                        }
                    }
                    _ = claim.tick() => {
                        let free = semaphore.available_permits();
                        if free == 0 {
                            debug!("All slots busy, skipping reclaim");
                            continue;
                        }
                        match ctx.queue.reclaim_stale(&consumer_name, claim_min_idle, free).await {
                            Ok(deliveries) if !deliveries.is_empty() => {
                                info!("Claimed {} stale deliveries", deliveries.len());
                                for delivery in deliveries {
                                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                                        warn!(job_id = %delivery.job.job_id, "No free slot for claimed delivery");
                                        continue;
                                    };
                                    let handler = Arc::clone(&handler);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        handler.handle(delivery).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim stale deliveries: {}", e),
                        }
                    }
                }
            }
        })
    }

    async fn wait_for_jobs(&self) {
        let all = self.config.max_concurrent_jobs as u32;
        match self.job_semaphore.acquire_many(all).await {
            Ok(permits) => drop(permits),
            Err(_) => warn!("Job semaphore closed while draining"),
        }
    }
}
