//! Shared HTTP plumbing for the backend adapters.

use std::future::Future;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::debug;
use vgen_models::Backend;

use crate::error::{GenerationError, GenerationResult};

/// Status of a backend task as seen by one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskState {
    Running,
    Succeeded(String),
    Failed(String),
}

/// How often to poll and for how long.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(600),
        }
    }
}

/// Send a request and decode a JSON body, normalising transport and status failures.
pub(crate) async fn send_json<T: DeserializeOwned>(
    backend: Backend,
    request: RequestBuilder,
) -> GenerationResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::request(backend, e))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationError::from_http_status(backend, status, &body));
    }

    response.json::<T>().await.map_err(|e| {
        GenerationError::invalid_response(backend, format!("failed to decode response: {e}"))
    })
}

/// Call `check` until it reports a terminal state or the deadline passes.
pub(crate) async fn poll_until_done<F, Fut>(
    backend: Backend,
    task_id: &str,
    settings: PollSettings,
    mut check: F,
) -> GenerationResult<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GenerationResult<TaskState>>,
{
    let deadline = Instant::now() + settings.max_wait;

    loop {
        match check().await? {
            TaskState::Succeeded(url) => return Ok(url),
            TaskState::Failed(message) => return Err(GenerationError::failed(backend, message)),
            TaskState::Running => {
                debug!(backend = %backend, task_id = task_id, "Generation still running");
            }
        }

        if Instant::now() + settings.interval > deadline {
            return Err(GenerationError::Timeout {
                backend,
                seconds: settings.max_wait.as_secs(),
            });
        }
        tokio::time::sleep(settings.interval).await;
    }
}
