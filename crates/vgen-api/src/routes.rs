//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    cancel_job, clear_completed_jobs, create_job, create_jobs_batch, enqueue_job, estimate_cost,
    get_download_url, get_job, get_queue_stats, get_system_status, health, pause_system, ready,
    resume_system, retry_job, stream_progress,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/batch", post(create_jobs_batch))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/jobs/:job_id/retry", post(retry_job))
        .route("/jobs/:job_id/enqueue", post(enqueue_job))
        .route("/projects/:project_ref/jobs/completed", delete(clear_completed_jobs));

    let system_routes = Router::new()
        .route("/system/status", get(get_system_status))
        .route("/system/pause", post(pause_system))
        .route("/system/resume", post(resume_system))
        .route("/queue/stats", get(get_queue_stats));

    let delivery_routes = Router::new()
        .route("/estimate", post(estimate_cost))
        .route("/videos/by-job/:job_id/download", get(get_download_url));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(job_routes)
        .merge(system_routes)
        .merge(delivery_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // Long-lived streams stay outside the per-request rate limit
    let stream_routes = Router::new().route("/jobs/:job_id/progress", get(stream_progress));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes.merge(stream_routes))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
