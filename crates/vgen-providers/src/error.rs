//! Provider error types.

use thiserror::Error;
use vgen_models::Backend;

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Any failure of a video generation backend, normalised.
///
/// The display string is what ends up in the job's error message, so every
/// variant carries the upstream message verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("{backend} request failed: {message}")]
    Request { backend: Backend, message: String },

    #[error("{backend} returned {status}: {message}")]
    Upstream {
        backend: Backend,
        status: u16,
        message: String,
    },

    #[error("{backend} generation failed: {message}")]
    Failed { backend: Backend, message: String },

    #[error("{backend} returned an invalid response: {message}")]
    InvalidResponse { backend: Backend, message: String },

    #[error("{backend} did not finish within {seconds}s")]
    Timeout { backend: Backend, seconds: u64 },

    #[error("No provider configured for backend {0}")]
    BackendUnavailable(Backend),
}

impl GenerationError {
    pub fn request(backend: Backend, err: impl std::fmt::Display) -> Self {
        Self::Request {
            backend,
            message: err.to_string(),
        }
    }

    pub fn failed(backend: Backend, message: impl Into<String>) -> Self {
        Self::Failed {
            backend,
            message: message.into(),
        }
    }

    pub fn invalid_response(backend: Backend, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            backend,
            message: message.into(),
        }
    }

    pub fn from_http_status(backend: Backend, status: u16, body: &str) -> Self {
        Self::Upstream {
            backend,
            status,
            message: upstream_message(body),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            GenerationError::Request { backend, .. }
            | GenerationError::Upstream { backend, .. }
            | GenerationError::Failed { backend, .. }
            | GenerationError::InvalidResponse { backend, .. }
            | GenerationError::Timeout { backend, .. } => *backend,
            GenerationError::BackendUnavailable(backend) => *backend,
        }
    }
}

/// Text-to-speech failures. Never fatal to a job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TtsError {
    #[error("TTS request failed: {0}")]
    Request(String),

    #[error("TTS returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("TTS returned no audio")]
    EmptyAudio,

    #[error("TTS timed out after {0}s")]
    Timeout(u64),
}

impl TtsError {
    pub fn from_http_status(status: u16, body: &str) -> Self {
        Self::Upstream {
            status,
            message: upstream_message(body),
        }
    }
}

/// Pull the human-readable message out of a JSON error body when there is one.
pub(crate) fn upstream_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        ["detail", "error", "message", "failure_reason"]
            .iter()
            .find_map(|field| match v.get(field) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Object(o)) => o
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
                _ => None,
            })
    });

    from_json.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "empty response body".to_string()
        } else {
            trimmed.chars().take(500).collect()
        }
    })
}
