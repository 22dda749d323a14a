//! Persisted video records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{AspectRatio, Backend, JobId, VideoStyle, VoiceSelection};

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a video was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    pub backend: Backend,
    pub model: String,
    /// A voice track was muxed into the uploaded file
    pub has_audio: bool,
    /// Provider media URL before upload
    pub source_url: String,
    pub cost_cents: u32,
    pub style: VideoStyle,
    pub aspect_ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceSelection>,
}

/// A produced video. Written once per completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    pub id: VideoId,

    /// Job that produced the video; also the idempotency key
    pub job_ref: JobId,

    /// Job attempt that produced the video
    #[serde(default)]
    pub attempt: u32,

    pub product_ref: String,
    pub project_ref: String,

    /// Durable object storage URL
    pub media_ref: String,

    /// Object storage key
    pub storage_key: String,

    pub size_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    pub metadata: VideoMetadata,

    /// Owned by the gallery; the pipeline never writes it after creation
    #[serde(default)]
    pub view_count: u64,

    /// Owned by the publishing flow
    #[serde(default)]
    pub published: bool,

    pub created_at: DateTime<Utc>,
}

impl Video {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_ref: JobId,
        product_ref: impl Into<String>,
        project_ref: impl Into<String>,
        media_ref: impl Into<String>,
        storage_key: impl Into<String>,
        size_bytes: u64,
        duration_seconds: Option<f64>,
        metadata: VideoMetadata,
    ) -> Self {
        Self {
            id: VideoId::new(),
            job_ref,
            attempt: 0,
            product_ref: product_ref.into(),
            project_ref: project_ref.into(),
            media_ref: media_ref.into(),
            storage_key: storage_key.into(),
            size_bytes,
            duration_seconds,
            metadata,
            view_count: 0,
            published: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}
