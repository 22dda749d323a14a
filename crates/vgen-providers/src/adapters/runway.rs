//! Runway Gen-3 Alpha adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use vgen_models::Backend;

use crate::error::{GenerationError, GenerationResult};
use crate::http::{poll_until_done, send_json, PollSettings, TaskState};
use crate::provider::{GenerationOutput, GenerationRequest, VideoGenerationProvider};

#[derive(Debug, Deserialize)]
struct Task {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Option<TaskOutput>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskOutput {
    video_url: Option<String>,
}

pub struct RunwayProvider {
    client: Client,
    api_key: String,
    base_url: String,
    poll: PollSettings,
}

impl RunwayProvider {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        poll: PollSettings,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll,
        }
    }

    async fn fetch(&self, id: &str) -> GenerationResult<TaskState> {
        let task: Task = send_json(
            Backend::Runway,
            self.client
                .get(format!("{}/video-generations/{}", self.base_url, id))
                .bearer_auth(&self.api_key),
        )
        .await?;
        state_of(&task)
    }
}

/// Output resolution for a quality hint.
fn resolution_for(quality: Option<&str>) -> &'static str {
    match quality {
        Some("high") => "1080p",
        Some("low") => "480p",
        _ => "720p",
    }
}

fn state_of(task: &Task) -> GenerationResult<TaskState> {
    match task.status.to_uppercase().as_str() {
        "PENDING" | "QUEUED" | "IN_PROGRESS" | "PROCESSING" | "" => Ok(TaskState::Running),
        "COMPLETED" | "SUCCESS" | "SUCCEEDED" => task
            .output
            .as_ref()
            .and_then(|o| o.video_url.clone())
            .map(TaskState::Succeeded)
            .ok_or_else(|| {
                GenerationError::invalid_response(Backend::Runway, "completed task has no video url")
            }),
        "FAILED" | "ERROR" => Ok(TaskState::Failed(
            task.error.clone().unwrap_or_else(|| "generation failed".to_string()),
        )),
        other => Err(GenerationError::invalid_response(
            Backend::Runway,
            format!("unknown task status '{other}'"),
        )),
    }
}

#[async_trait]
impl VideoGenerationProvider for RunwayProvider {
    fn backend(&self) -> Backend {
        Backend::Runway
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GenerationOutput> {
        let body = json!({
            "model": Backend::Runway.model(),
            "input": {
                "image_url": request.image_url,
                "text_prompt": request.prompt,
            },
            "parameters": {
                "duration": request.duration_seconds,
                "aspect_ratio": request.aspect_ratio.as_ratio(),
                "resolution": resolution_for(request.quality.as_deref()),
            },
        });

        let created: Task = send_json(
            Backend::Runway,
            self.client
                .post(format!("{}/video-generations", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        info!(task_id = %created.id, "Runway task created");

        let id = created.id.as_str();
        let media_url = poll_until_done(Backend::Runway, id, self.poll, move || async move {
            self.fetch(id).await
        })
        .await?;

        Ok(GenerationOutput {
            media_url,
            external_id: created.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vgen_models::{AspectRatio, VideoStyle};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_resolution_for_quality() {
        assert_eq!(resolution_for(Some("high")), "1080p");
        assert_eq!(resolution_for(Some("medium")), "720p");
        assert_eq!(resolution_for(Some("low")), "480p");
        assert_eq!(resolution_for(None), "720p");
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/video-generations"))
            .and(body_partial_json(json!({
                "model": "gen-3-alpha",
                "input": { "image_url": "https://img/shoe.png" },
                "parameters": { "aspect_ratio": "9:16", "resolution": "1080p" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "rw1", "status": "PENDING" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/video-generations/rw1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rw1", "status": "COMPLETED", "output": { "video_url": "https://runway/rw1.mp4" }
            })))
            .mount(&server)
            .await;

        let provider = RunwayProvider::new(
            Client::new(),
            "rw_key",
            server.uri(),
            PollSettings {
                interval: Duration::from_millis(5),
                max_wait: Duration::from_secs(2),
            },
        );
        let request = GenerationRequest {
            style: VideoStyle::Testimonial,
            prompt: "excited runner".to_string(),
            image_url: "https://img/shoe.png".to_string(),
            aspect_ratio: AspectRatio::Portrait,
            duration_seconds: 5,
            quality: Some("high".to_string()),
        };

        let output = provider.generate(&request).await.unwrap();
        assert_eq!(output.media_url, "https://runway/rw1.mp4");
    }
}
