//! Submission path: submit, query, cancel and retry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vgen_models::{Backend, Job, JobId, JobSettings, JobSnapshot, JobStatus, VideoStyle};
use vgen_queue::{DurableQueue, GenerateVideoJob, QueueError};

use crate::catalog::ImageSource;
use crate::error::{StoreError, StoreResult};
use crate::jobs::JobRepository;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub product_ref: String,
    pub project_ref: String,
    pub style: VideoStyle,
    #[serde(default)]
    pub model_preference: Option<Backend>,
    #[serde(default)]
    pub settings: JobSettings,
}

/// Same style and settings applied to several products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmitRequest {
    pub project_ref: String,
    pub product_refs: Vec<String>,
    pub style: VideoStyle,
    #[serde(default)]
    pub model_preference: Option<Backend>,
    #[serde(default)]
    pub settings: JobSettings,
}

/// Per-product outcome of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub product_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct JobService {
    jobs: JobRepository,
    queue: Arc<dyn DurableQueue>,
    images: Arc<dyn ImageSource>,
}

impl JobService {
    pub fn new(
        jobs: JobRepository,
        queue: Arc<dyn DurableQueue>,
        images: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            jobs,
            queue,
            images,
        }
    }

    pub fn jobs(&self) -> &JobRepository {
        &self.jobs
    }

    /// Create a PENDING job and enqueue it.
    ///
    /// If the queue is down the job row is kept and the error carries its id,
    /// so the caller can `requeue` later without creating a second row.
    pub async fn submit(&self, request: SubmitJobRequest) -> StoreResult<JobId> {
        let product = self
            .images
            .product(&request.project_ref, &request.product_ref)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("product {}", request.product_ref)))?;

        if product.images.is_empty() {
            return Err(StoreError::validation("product has no source images"));
        }

        let mut settings = request.settings;
        if settings.product_title.trim().is_empty() {
            settings.product_title = product.title.clone();
        }
        if settings.product_description.trim().is_empty() {
            settings.product_description = product.description.clone();
        }

        let mut job = Job::new(
            request.product_ref,
            request.project_ref,
            request.style,
            settings,
            product.images,
        );
        job.model_preference = request.model_preference;

        let job = self.jobs.create(job).await?;
        self.enqueue(&job).await?;
        Ok(job.id)
    }

    /// Submit one job per product. Failures are reported per item.
    pub async fn submit_batch(&self, request: BatchSubmitRequest) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(request.product_refs.len());

        for product_ref in request.product_refs {
            let outcome = self
                .submit(SubmitJobRequest {
                    product_ref: product_ref.clone(),
                    project_ref: request.project_ref.clone(),
                    style: request.style,
                    model_preference: request.model_preference,
                    settings: request.settings.clone(),
                })
                .await;

            items.push(match outcome {
                Ok(job_id) => BatchItem {
                    product_ref,
                    job_id: Some(job_id),
                    error: None,
                },
                Err(StoreError::QueueUnavailable { job_id, message }) => BatchItem {
                    product_ref,
                    job_id: Some(job_id),
                    error: Some(message),
                },
                Err(e) => BatchItem {
                    product_ref,
                    job_id: None,
                    error: Some(e.to_string()),
                },
            });
        }

        items
    }

    /// Enqueue an existing PENDING job again, e.g. after a queue outage.
    pub async fn requeue(&self, id: &JobId) -> StoreResult<()> {
        let job = self.jobs.require(id).await?;
        if job.status != JobStatus::Pending {
            return Err(StoreError::Conflict {
                id: id.clone(),
                expected: JobStatus::Pending,
                actual: job.status,
            });
        }
        self.enqueue(&job).await
    }

    pub async fn query(&self, id: &JobId) -> StoreResult<JobSnapshot> {
        Ok(self.jobs.require(id).await?.snapshot())
    }

    /// Cancel from PENDING or PROCESSING. An in-flight worker notices at
    /// its next stage boundary.
    pub async fn cancel(&self, id: &JobId) -> StoreResult<JobSnapshot> {
        Ok(self.jobs.cancel(id).await?.snapshot())
    }

    /// FAILED -> PENDING, then enqueue a fresh payload.
    pub async fn retry(&self, id: &JobId) -> StoreResult<JobSnapshot> {
        let job = self.jobs.retry(id).await?;
        self.enqueue(&job).await?;
        Ok(job.snapshot())
    }

    pub async fn clear_completed(&self, project_ref: &str) -> StoreResult<usize> {
        self.jobs.clear_completed(project_ref).await
    }

    async fn enqueue(&self, job: &Job) -> StoreResult<()> {
        match self.queue.enqueue(GenerateVideoJob::for_job(job)).await {
            Ok(message_id) => {
                info!(job_id = %job.id, message_id = %message_id, "Job queued");
                Ok(())
            }
            Err(QueueError::Duplicate(key)) => {
                info!(job_id = %job.id, key = %key, "Job already queued");
                Ok(())
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to queue job");
                Err(StoreError::QueueUnavailable {
                    job_id: job.id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}
