//! Structured job logging utilities.
//!
//! Every event carries the job id and the stage it happened in, plus the
//! time elapsed since the logger was created.

use std::time::Instant;

use tracing::{error, info, warn, Span};
use vgen_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: &'static str,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage: "pickup",
            started: Instant::now(),
        }
    }

    /// Move on to the next stage. Elapsed time keeps counting from creation.
    pub fn enter(&mut self, stage: &'static str) {
        self.stage = stage;
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            elapsed_ms = self.elapsed_ms(),
            "Stage started"
        );
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, progress: u8) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            progress,
            elapsed_ms = self.elapsed_ms(),
            "Job progress"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            stage = self.stage,
            elapsed_ms = self.elapsed_ms(),
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            stage = self.stage,
            elapsed_ms = self.elapsed_ms(),
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = self.stage,
            elapsed_ms = self.elapsed_ms(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Span for everything done on behalf of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}
