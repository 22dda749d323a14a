//! Luma Dream Machine adapter.

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
struct Generation {
    id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    video: Option<GenerationVideo>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationVideo {
    url: Option<String>,
}

pub struct LumaProvider {
    client: Client,
    api_key: String,
    base_url: String,
    poll: PollSettings,
}

impl LumaProvider {
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
        let generation: Generation = send_json(
            Backend::Luma,
            self.client
                .get(format!("{}/generations/{}", self.base_url, id))
                .bearer_auth(&self.api_key),
        )
        .await?;
        state_of(&generation)
    }
}

fn state_of(generation: &Generation) -> GenerationResult<TaskState> {
    match generation.state.as_str() {
        "pending" | "queued" | "processing" | "dreaming" | "" => Ok(TaskState::Running),
        "completed" | "ready" => generation
            .video
            .as_ref()
            .and_then(|v| v.url.clone())
            .map(TaskState::Succeeded)
            .ok_or_else(|| {
                GenerationError::invalid_response(Backend::Luma, "completed generation has no video url")
            }),
        "failed" | "error" => Ok(TaskState::Failed(
            generation
                .failure_reason
                .clone()
                .unwrap_or_else(|| "generation failed".to_string()),
        )),
        other => Err(GenerationError::invalid_response(
            Backend::Luma,
            format!("unknown generation state '{other}'"),
        )),
    }
}

#[async_trait]
impl VideoGenerationProvider for LumaProvider {
    fn backend(&self) -> Backend {
        Backend::Luma
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GenerationOutput> {
        let body = json!({
            "prompt": request.prompt,
            "keyframes": {
                "frame0": { "type": "image", "url": request.image_url }
            },
            "aspect_ratio": request.aspect_ratio.as_ratio(),
            "loop": false,
            "duration": request.duration_seconds,
        });

        let created: Generation = send_json(
            Backend::Luma,
            self.client
                .post(format!("{}/generations", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        info!(generation_id = %created.id, "Luma generation created");

        let id = created.id.as_str();
        let media_url = poll_until_done(Backend::Luma, id, self.poll, move || async move {
            self.fetch(id).await
        })
        .await?;

        Ok(GenerationOutput {
            media_url,
            external_id: created.id,
        })
    }
}
