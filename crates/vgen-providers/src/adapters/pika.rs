//! Pika adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use vgen_models::Backend;

use crate::error::{GenerationError, GenerationResult};
use crate::http::{poll_until_done, send_json, PollSettings, TaskState};
use crate::provider::{GenerationOutput, GenerationRequest, VideoGenerationProvider};

const FRAME_RATE: u32 = 24;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Created {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    #[serde(default)]
    status: String,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct PikaProvider {
    client: Client,
    api_key: String,
    base_url: String,
    poll: PollSettings,
}

impl PikaProvider {
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
        let status: Status = send_json(
            Backend::Pika,
            self.client
                .get(format!("{}/status/{}", self.base_url, id))
                .bearer_auth(&self.api_key),
        )
        .await?;

        match status.status.as_str() {
            "waiting" | "queued" | "processing" | "generating" | "" => Ok(TaskState::Running),
            "completed" | "done" => status.result_url.map(TaskState::Succeeded).ok_or_else(|| {
                GenerationError::invalid_response(Backend::Pika, "completed task has no result url")
            }),
            "failed" | "error" => Ok(TaskState::Failed(
                status.error.unwrap_or_else(|| "generation failed".to_string()),
            )),
            other => Err(GenerationError::invalid_response(
                Backend::Pika,
                format!("unknown task status '{other}'"),
            )),
        }
    }
}

#[async_trait]
impl VideoGenerationProvider for PikaProvider {
    fn backend(&self) -> Backend {
        Backend::Pika
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GenerationOutput> {
        let body = json!({
            "image": request.image_url,
            "prompt": request.prompt,
            "options": {
                "frameRate": FRAME_RATE,
                "duration": request.duration_seconds,
                "aspectRatio": request.aspect_ratio.as_ratio(),
                "quality": request.quality.as_deref().unwrap_or("medium"),
                "style": request.style.as_str(),
            },
        });

        let created: Created = send_json(
            Backend::Pika,
            self.client
                .post(format!("{}/generate", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        info!(task_id = %created.task_id, "Pika task created");

        let id = created.task_id.as_str();
        let media_url = poll_until_done(Backend::Pika, id, self.poll, move || async move {
            self.fetch(id).await
        })
        .await?;

        Ok(GenerationOutput {
            media_url,
            external_id: created.task_id,
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

    fn provider(server: &MockServer) -> PikaProvider {
        PikaProvider::new(
            Client::new(),
            "pk",
            server.uri(),
            PollSettings {
                interval: Duration::from_millis(5),
                max_wait: Duration::from_secs(2),
            },
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            style: VideoStyle::HowTo,
            prompt: "how to fold".to_string(),
            image_url: "https://img/chair.png".to_string(),
            aspect_ratio: AspectRatio::Landscape,
            duration_seconds: 3,
            quality: None,
        }
    }

    #[tokio::test]
    async fn test_generate_and_poll() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(json!({
                "image": "https://img/chair.png",
                "options": { "frameRate": 24, "quality": "medium", "style": "how_to", "aspectRatio": "16:9" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "taskId": "pk1" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status/pk1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed", "resultUrl": "https://pika/pk1.mp4"
            })))
            .mount(&server)
            .await;

        let output = provider(&server).generate(&request()).await.unwrap();
        assert_eq!(output.media_url, "https://pika/pk1.mp4");
        assert_eq!(output.external_id, "pk1");
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { status: 503, .. }));
        assert!(err.to_string().contains("overloaded"));
    }
}
