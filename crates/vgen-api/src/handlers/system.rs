//! Pause switch and system status.
//!
//! The pause flag lives in the control store, so it survives restarts and
//! every worker observes it before its next dequeue.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use vgen_queue::QueueStats;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub paused: bool,
    /// Absent when the queue could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueStats>,
}

/// GET /api/system/status
pub async fn get_system_status(State(state): State<AppState>) -> ApiResult<Json<SystemStatusResponse>> {
    status(&state).await.map(Json)
}

/// POST /api/system/pause
pub async fn pause_system(State(state): State<AppState>) -> ApiResult<Json<SystemStatusResponse>> {
    state.control.set_paused(true).await?;
    info!("Job processing paused");
    status(&state).await.map(Json)
}

/// POST /api/system/resume
pub async fn resume_system(State(state): State<AppState>) -> ApiResult<Json<SystemStatusResponse>> {
    state.control.set_paused(false).await?;
    info!("Job processing resumed");
    status(&state).await.map(Json)
}

async fn status(state: &AppState) -> ApiResult<SystemStatusResponse> {
    let paused = state.control.is_paused().await?;
    let queue = match state.queue.stats().await {
        Ok(stats) => {
            metrics::set_queue_stats(&stats);
            Some(stats)
        }
        Err(e) => {
            warn!(error = %e, "Failed to read queue stats");
            None
        }
    };
    Ok(SystemStatusResponse { paused, queue })
}
