//! Queue inspection.

use axum::extract::State;
use axum::Json;

use vgen_queue::QueueStats;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// GET /api/queue/stats
pub async fn get_queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    let stats = state.queue.stats().await?;
    metrics::set_queue_stats(&stats);
    Ok(Json(stats))
}
