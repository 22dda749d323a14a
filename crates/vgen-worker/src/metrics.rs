//! Worker metrics.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vgen_worker_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vgen_worker_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vgen_worker_jobs_failed_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "vgen_worker_jobs_cancelled_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "vgen_worker_jobs_dead_lettered_total";
    pub const DELIVERIES_RETRIED_TOTAL: &str = "vgen_worker_deliveries_retried_total";
    pub const STAGE_DURATION_SECONDS: &str = "vgen_worker_stage_duration_seconds";
    pub const JOB_DURATION_SECONDS: &str = "vgen_worker_job_duration_seconds";
    pub const AUDIO_DEGRADED_TOTAL: &str = "vgen_worker_audio_degraded_total";
    pub const JOBS_IN_FLIGHT: &str = "vgen_worker_jobs_in_flight";
    pub const PAUSED: &str = "vgen_worker_paused";
}

/// Serve Prometheus text on `0.0.0.0:{port}`.
pub fn install_exporter(port: u16) -> Result<(), String> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())
}

pub fn record_stage(stage: &'static str, elapsed: Duration) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
}

pub fn increment(name: &'static str) {
    counter!(name).increment(1);
}

pub fn record_job_duration(elapsed: Duration) {
    histogram!(names::JOB_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn set_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

pub fn set_paused(paused: bool) {
    gauge!(names::PAUSED).set(if paused { 1.0 } else { 0.0 });
}
