//! Job submission and lifecycle handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use vgen_models::{Backend, JobId, JobSettings, JobSnapshot, VideoStyle};
use vgen_store::{BatchItem, BatchSubmitRequest, SubmitJobRequest};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Upper bound on products per batch request.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 128))]
    pub product_ref: String,
    #[validate(length(min = 1, max = 128))]
    pub project_ref: String,
    pub style: VideoStyle,
    #[serde(default)]
    pub model_preference: Option<Backend>,
    #[serde(default)]
    pub settings: JobSettings,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchJobRequest {
    #[validate(length(min = 1, max = 128))]
    pub project_ref: String,
    #[validate(length(min = 1, max = 100))]
    pub product_refs: Vec<String>,
    pub style: VideoStyle,
    #[serde(default)]
    pub model_preference: Option<Backend>,
    #[serde(default)]
    pub settings: JobSettings,
}

#[derive(Debug, Serialize)]
pub struct BatchJobResponse {
    pub submitted: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: JobId,
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearCompletedResponse {
    pub project_ref: String,
    pub removed: usize,
}

/// Job ids are generated server-side; anything else is rejected before a store lookup.
pub(crate) fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    let valid = !raw.is_empty()
        && raw.len() <= 64
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(JobId::from_string(raw))
    } else {
        Err(ApiError::bad_request("Invalid job ID format"))
    }
}

fn validate(request: &impl Validate) -> ApiResult<()> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    validate(&request)?;
    let style = request.style;

    let job_id = state
        .service
        .submit(SubmitJobRequest {
            product_ref: request.product_ref,
            project_ref: request.project_ref,
            style,
            model_preference: request.model_preference,
            settings: request.settings,
        })
        .await?;

    metrics::record_jobs_submitted(style.as_str(), 1);
    info!(job_id = %job_id, style = %style, "Job submitted");
    Ok((StatusCode::ACCEPTED, Json(CreateJobResponse { job_id })))
}

/// POST /api/jobs/batch
///
/// Items fail independently; the response reports each product.
pub async fn create_jobs_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchJobRequest>,
) -> ApiResult<(StatusCode, Json<BatchJobResponse>)> {
    validate(&request)?;
    if request.product_refs.iter().any(|p| p.trim().is_empty()) {
        return Err(ApiError::Validation("product_refs must not contain empty values".into()));
    }
    let style = request.style;

    let items = state
        .service
        .submit_batch(BatchSubmitRequest {
            project_ref: request.project_ref,
            product_refs: request.product_refs,
            style,
            model_preference: request.model_preference,
            settings: request.settings,
        })
        .await;

    let failed = items.iter().filter(|i| i.error.is_some()).count();
    let submitted = items.len() - failed;
    metrics::record_jobs_submitted(style.as_str(), submitted as u64);
    info!(submitted, failed, style = %style, "Batch submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchJobResponse {
            submitted,
            failed,
            items,
        }),
    ))
}

/// GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&job_id)?;
    Ok(Json(state.service.query(&id).await?))
}

/// POST /api/jobs/:job_id/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&job_id)?;
    let snapshot = state.service.cancel(&id).await?;
    metrics::record_job_cancelled();
    info!(job_id = %id, "Job cancelled");
    Ok(Json(snapshot))
}

/// POST /api/jobs/:job_id/retry
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&job_id)?;
    let snapshot = state.service.retry(&id).await?;
    metrics::record_job_retried();
    info!(job_id = %id, attempts = snapshot.attempts, "Job retried");
    Ok(Json(snapshot))
}

/// POST /api/jobs/:job_id/enqueue
///
/// Re-enqueue a PENDING job whose original enqueue failed.
pub async fn enqueue_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<EnqueueResponse>> {
    let id = parse_job_id(&job_id)?;
    state.service.requeue(&id).await?;
    Ok(Json(EnqueueResponse {
        job_id: id,
        queued: true,
    }))
}

/// DELETE /api/projects/:project_ref/jobs/completed
pub async fn clear_completed_jobs(
    State(state): State<AppState>,
    Path(project_ref): Path<String>,
) -> ApiResult<Json<ClearCompletedResponse>> {
    if project_ref.trim().is_empty() {
        return Err(ApiError::bad_request("project_ref is required"));
    }
    let removed = state.service.clear_completed(&project_ref).await?;
    Ok(Json(ClearCompletedResponse {
        project_ref,
        removed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_id() {
        assert!(parse_job_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(parse_job_id("job_1").is_ok());
        assert!(parse_job_id("").is_err());
        assert!(parse_job_id("../etc/passwd").is_err());
        assert!(parse_job_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_batch_request_validation() {
        let request = BatchJobRequest {
            project_ref: "proj-1".into(),
            product_refs: vec![],
            style: VideoStyle::Rotation,
            model_preference: None,
            settings: JobSettings::default(),
        };
        assert!(request.validate().is_err());

        let request = BatchJobRequest {
            product_refs: vec!["p".into(); MAX_BATCH_SIZE + 1],
            ..request
        };
        assert!(request.validate().is_err());
    }
}
