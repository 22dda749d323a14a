//! The video generation capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vgen_models::{AspectRatio, Backend, VideoStyle};

use crate::error::GenerationResult;
use crate::strategy::Strategy;

/// Backend-neutral generation request built from a [`Strategy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub style: VideoStyle,
    pub prompt: String,
    pub image_url: String,
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl GenerationRequest {
    pub fn from_strategy(strategy: &Strategy, image_url: impl Into<String>) -> Self {
        Self {
            style: strategy.style,
            prompt: strategy.prompt.clone(),
            image_url: image_url.into(),
            aspect_ratio: strategy.aspect_ratio,
            duration_seconds: strategy.duration_seconds,
            quality: strategy.quality.clone(),
        }
    }
}

/// What a backend hands back once the clip is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Where the generated clip can be downloaded from.
    pub media_url: String,
    /// Backend-side task or prediction identifier.
    pub external_id: String,
}

/// One implementation per backend. Adapters only translate the request shape
/// and poll until the backend reports a terminal state.
#[async_trait]
pub trait VideoGenerationProvider: Send + Sync {
    fn backend(&self) -> Backend;

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GenerationOutput>;
}
