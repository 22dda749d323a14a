//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vgen_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vgen_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vgen_http_requests_in_flight";

    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "vgen_jobs_submitted_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "vgen_jobs_cancelled_total";
    pub const JOBS_RETRIED_TOTAL: &str = "vgen_jobs_retried_total";
    pub const JOBS_STALLED_TOTAL: &str = "vgen_jobs_stalled_total";
    pub const PROGRESS_STREAMS_ACTIVE: &str = "vgen_progress_streams_active";

    // Queue metrics
    pub const QUEUE_READY: &str = "vgen_queue_ready";
    pub const QUEUE_DELAYED: &str = "vgen_queue_delayed";
    pub const QUEUE_IN_FLIGHT: &str = "vgen_queue_in_flight";
    pub const QUEUE_DLQ_LENGTH: &str = "vgen_queue_dlq_length";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vgen_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record submitted jobs by style.
pub fn record_jobs_submitted(style: &str, count: u64) {
    let labels = [("style", style.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(count);
}

pub fn record_job_cancelled() {
    counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
}

pub fn record_job_retried() {
    counter!(names::JOBS_RETRIED_TOTAL).increment(1);
}

pub fn record_jobs_stalled(count: u64) {
    counter!(names::JOBS_STALLED_TOTAL).increment(count);
}

pub fn progress_stream_opened() {
    gauge!(names::PROGRESS_STREAMS_ACTIVE).increment(1.0);
}

pub fn progress_stream_closed() {
    gauge!(names::PROGRESS_STREAMS_ACTIVE).decrement(1.0);
}

/// Update queue depth gauges.
pub fn set_queue_stats(stats: &vgen_queue::QueueStats) {
    gauge!(names::QUEUE_READY).set(stats.ready as f64);
    gauge!(names::QUEUE_DELAYED).set(stats.delayed as f64);
    gauge!(names::QUEUE_IN_FLIGHT).set(stats.in_flight as f64);
    gauge!(names::QUEUE_DLQ_LENGTH).set(stats.dead_lettered as f64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

struct PathPatterns {
    uuid: Regex,
    numeric: Regex,
    job: Regex,
    by_job: Regex,
    project: Regex,
}

fn patterns() -> Option<&'static PathPatterns> {
    static PATTERNS: OnceLock<Option<PathPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(PathPatterns {
                uuid: Regex::new(
                    r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
                )
                .ok()?,
                numeric: Regex::new(r"/[0-9]+(/|$)").ok()?,
                job: Regex::new(r"^/api/jobs/[a-zA-Z0-9_-]+").ok()?,
                by_job: Regex::new(r"/by-job/[a-zA-Z0-9_-]+").ok()?,
                project: Regex::new(r"/projects/[a-zA-Z0-9_-]+").ok()?,
            })
        })
        .as_ref()
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let Some(p) = patterns() else {
        return path.to_string();
    };
    if path == "/api/jobs/batch" {
        return path.to_string();
    }
    let path = p.uuid.replace_all(path, ":id").into_owned();
    let path = p.numeric.replace_all(&path, "/:id$1").into_owned();
    let path = p.job.replace_all(&path, "/api/jobs/:job_id").into_owned();
    let path = p.by_job.replace_all(&path, "/by-job/:job_id").into_owned();
    p.project.replace_all(&path, "/projects/:project").into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
