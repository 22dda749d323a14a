//! Server-sent progress stream.
//!
//! The stream re-reads the job every poll interval and emits a `progress`
//! event whenever the snapshot changed. It ends with a `done` event once the
//! job is COMPLETED or FAILED, or a `gone` event if the job row disappears.
//! Store hiccups are logged and polling continues.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use tracing::{debug, warn};

use vgen_models::{JobId, JobSnapshot};
use vgen_store::JobRepository;

use crate::error::ApiResult;
use crate::handlers::jobs::parse_job_id;
use crate::metrics;
use crate::state::AppState;

/// GET /api/jobs/:job_id/progress
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let id = parse_job_id(&job_id)?;
    let initial = state.service.query(&id).await?;

    let poller = ProgressPoller::new(
        state.jobs.clone(),
        id,
        state.config.progress_poll_interval,
        initial,
    );
    let events = stream::unfold(poller, |mut poller| async move {
        let event = poller.next_event().await?;
        Some((Ok(event), poller))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

struct ProgressPoller {
    jobs: JobRepository,
    id: JobId,
    interval: Duration,
    pending: Option<JobSnapshot>,
    last: Option<JobSnapshot>,
    done: bool,
}

impl ProgressPoller {
    fn new(jobs: JobRepository, id: JobId, interval: Duration, initial: JobSnapshot) -> Self {
        metrics::progress_stream_opened();
        Self {
            jobs,
            id,
            interval,
            pending: Some(initial),
            last: None,
            done: false,
        }
    }

    async fn next_event(&mut self) -> Option<Event> {
        if self.done {
            return None;
        }
        if let Some(snapshot) = self.pending.take() {
            return Some(self.emit(snapshot));
        }

        loop {
            tokio::time::sleep(self.interval).await;
            match self.jobs.get(&self.id).await {
                Ok(Some(job)) => {
                    let snapshot = job.snapshot();
                    if self.last.as_ref() != Some(&snapshot) {
                        return Some(self.emit(snapshot));
                    }
                }
                Ok(None) => {
                    self.done = true;
                    return Some(Event::default().event("gone").data(self.id.as_str()));
                }
                Err(e) => {
                    warn!(job_id = %self.id, error = %e, "Progress poll failed");
                }
            }
        }
    }

    fn emit(&mut self, snapshot: JobSnapshot) -> Event {
        let name = if snapshot.status.is_finished() {
            self.done = true;
            "done"
        } else {
            "progress"
        };
        debug!(job_id = %self.id, status = %snapshot.status, progress = snapshot.progress, "Progress event");

        let data = serde_json::to_string(&snapshot).unwrap_or_default();
        self.last = Some(snapshot);
        Event::default().event(name).data(data)
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        metrics::progress_stream_closed();
    }
}
