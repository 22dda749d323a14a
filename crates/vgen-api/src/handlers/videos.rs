//! Video delivery handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vgen_models::{JobId, VideoId, VideoMetadata};

use crate::error::{ApiError, ApiResult};
use crate::handlers::jobs::parse_job_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub url: String,
    pub expires_in_secs: u64,
    pub size_bytes: u64,
    pub metadata: VideoMetadata,
}

/// GET /api/videos/by-job/:job_id/download
///
/// Short-lived signed URL for the video a job produced.
pub async fn get_download_url(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DownloadUrlResponse>> {
    let id = parse_job_id(&job_id)?;
    let video = state
        .videos
        .get_by_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no video for job {}", id)))?;

    let ttl = state.config.download_url_ttl;
    let url = state.objects.presign_get(&video.storage_key, ttl).await?;

    Ok(Json(DownloadUrlResponse {
        job_id: id,
        video_id: video.id,
        url,
        expires_in_secs: ttl.as_secs(),
        size_bytes: video.size_bytes,
        metadata: video.metadata,
    }))
}
