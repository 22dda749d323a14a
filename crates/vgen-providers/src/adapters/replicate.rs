//! Replicate predictions API (Sora 2 and Kling model slugs).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use vgen_models::Backend;

use crate::error::{GenerationError, GenerationResult};
use crate::http::{poll_until_done, send_json, PollSettings, TaskState};
use crate::provider::{GenerationOutput, GenerationRequest, VideoGenerationProvider};

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Replicate-hosted models. One instance per backend slug.
pub struct ReplicateProvider {
    backend: Backend,
    client: Client,
    api_token: String,
    base_url: String,
    poll: PollSettings,
}

impl ReplicateProvider {
    /// Returns `None` for backends Replicate doesn't host.
    pub fn new(
        backend: Backend,
        client: Client,
        api_token: impl Into<String>,
        base_url: impl Into<String>,
        poll: PollSettings,
    ) -> Option<Self> {
        if !matches!(backend, Backend::Sora | Backend::Kling) {
            return None;
        }
        Some(Self {
            backend,
            client,
            api_token: api_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll,
        })
    }

    fn input(&self, request: &GenerationRequest) -> Value {
        match self.backend {
            Backend::Kling => json!({
                "prompt": request.prompt,
                "start_image": request.image_url,
                "duration": request.duration_seconds,
                "aspect_ratio": request.aspect_ratio.as_ratio(),
            }),
            _ => json!({
                "prompt": request.prompt,
                "aspect_ratio": request.aspect_ratio.as_str(),
                "input_reference": request.image_url,
            }),
        }
    }

    fn state_of(&self, prediction: &Prediction) -> GenerationResult<TaskState> {
        match prediction.status.as_str() {
            "starting" | "processing" => Ok(TaskState::Running),
            "succeeded" => output_url(prediction.output.as_ref())
                .map(TaskState::Succeeded)
                .ok_or_else(|| {
                    GenerationError::invalid_response(self.backend, "prediction succeeded without output")
                }),
            "failed" | "canceled" => Ok(TaskState::Failed(
                prediction
                    .error
                    .as_ref()
                    .map(value_text)
                    .unwrap_or_else(|| format!("prediction {}", prediction.status)),
            )),
            other => Err(GenerationError::invalid_response(
                self.backend,
                format!("unknown prediction status '{other}'"),
            )),
        }
    }

    async fn fetch(&self, id: &str) -> GenerationResult<Prediction> {
        send_json(
            self.backend,
            self.client
                .get(format!("{}/predictions/{}", self.base_url, id))
                .bearer_auth(&self.api_token),
        )
        .await
    }
}

#[async_trait]
impl VideoGenerationProvider for ReplicateProvider {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GenerationOutput> {
        let url = format!("{}/models/{}/predictions", self.base_url, self.backend.model());

        let created: Prediction = send_json(
            self.backend,
            self.client
                .post(&url)
                .bearer_auth(&self.api_token)
                .header("Prefer", "wait")
                .json(&json!({ "input": self.input(request) })),
        )
        .await?;

        info!(backend = %self.backend, prediction_id = %created.id, "Replicate prediction created");

        let media_url = match self.state_of(&created)? {
            TaskState::Succeeded(url) => url,
            TaskState::Failed(message) => return Err(GenerationError::failed(self.backend, message)),
            TaskState::Running => {
                let id = created.id.as_str();
                poll_until_done(self.backend, id, self.poll, move || async move {
                    let prediction = self.fetch(id).await?;
                    self.state_of(&prediction)
                })
                .await?
            }
        };

        Ok(GenerationOutput {
            media_url,
            external_id: created.id,
        })
    }
}

/// Replicate outputs are either a URL string or a list of URLs.
fn output_url(output: Option<&Value>) -> Option<String> {
    match output? {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vgen_models::{AspectRatio, VideoStyle};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            style: VideoStyle::Rotation,
            prompt: "rotating lamp".to_string(),
            image_url: "https://img/lamp.png".to_string(),
            aspect_ratio: AspectRatio::Square,
            duration_seconds: 8,
            quality: None,
        }
    }

    fn provider(backend: Backend, server: &MockServer) -> ReplicateProvider {
        let poll = PollSettings {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_secs(2),
        };
        ReplicateProvider::new(backend, Client::new(), "r8_token", server.uri(), poll)
            .expect("replicate hosts this backend")
    }

    #[test]
    fn test_only_replicate_backends() {
        let poll = PollSettings::default();
        assert!(ReplicateProvider::new(Backend::Luma, Client::new(), "t", "http://x", poll).is_none());
        assert!(ReplicateProvider::new(Backend::Kling, Client::new(), "t", "http://x", poll).is_some());
    }

    #[test]
    fn test_output_url_shapes() {
        assert_eq!(output_url(Some(&json!("https://a"))), Some("https://a".to_string()));
        assert_eq!(output_url(Some(&json!(["https://b", "https://c"]))), Some("https://b".to_string()));
        assert_eq!(output_url(Some(&json!({}))), None);
        assert_eq!(output_url(None), None);
    }

    #[tokio::test]
    async fn test_sora_prediction_completes_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/openai/sora-2/predictions"))
            .and(header("authorization", "Bearer r8_token"))
            .and(body_partial_json(json!({
                "input": { "aspect_ratio": "square", "input_reference": "https://img/lamp.png" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p1", "status": "succeeded", "output": "https://replicate.delivery/clip.mp4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = provider(Backend::Sora, &server).generate(&request()).await.unwrap();
        assert_eq!(output.media_url, "https://replicate.delivery/clip.mp4");
        assert_eq!(output.external_id, "p1");
    }

    #[tokio::test]
    async fn test_kling_prediction_is_polled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/kwaivgi/kling-v1.6-standard/predictions"))
            .and(body_partial_json(json!({
                "input": { "start_image": "https://img/lamp.png", "duration": 8, "aspect_ratio": "1:1" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p2", "status": "starting"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/predictions/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p2", "status": "succeeded", "output": ["https://replicate.delivery/k.mp4"]
            })))
            .mount(&server)
            .await;

        let output = provider(Backend::Kling, &server).generate(&request()).await.unwrap();
        assert_eq!(output.media_url, "https://replicate.delivery/k.mp4");
    }

    #[tokio::test]
    async fn test_failed_prediction_carries_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p3", "status": "failed", "error": "input image rejected"
            })))
            .mount(&server)
            .await;

        let err = provider(Backend::Sora, &server).generate(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "sora generation failed: input image rejected");
    }

    #[tokio::test]
    async fn test_http_error_is_normalised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid API token" })),
            )
            .mount(&server)
            .await;

        let err = provider(Backend::Sora, &server).generate(&request()).await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::Upstream {
                backend: Backend::Sora,
                status: 401,
                message: "Invalid API token".to_string(),
            }
        );
    }
}
