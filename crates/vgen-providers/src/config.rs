//! Provider credentials and endpoints.

use std::time::Duration;

use crate::http::PollSettings;

/// Credentials and endpoints for every external capability.
///
/// A backend whose credential is missing is simply not registered.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub replicate_api_token: Option<String>,
    pub luma_api_key: Option<String>,
    pub runway_api_key: Option<String>,
    pub pika_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,

    pub replicate_base_url: String,
    pub luma_base_url: String,
    pub runway_base_url: String,
    pub pika_base_url: String,
    pub elevenlabs_base_url: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    pub poll: PollSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            replicate_api_token: None,
            luma_api_key: None,
            runway_api_key: None,
            pika_api_key: None,
            elevenlabs_api_key: None,
            replicate_base_url: "https://api.replicate.com/v1".to_string(),
            luma_base_url: "https://api.lumalabs.ai/dream-machine/v1".to_string(),
            runway_base_url: "https://api.runway.com/v1".to_string(),
            pika_base_url: "https://api.pika.art/v1".to_string(),
            elevenlabs_base_url: "https://api.elevenlabs.io/v1".to_string(),
            request_timeout: Duration::from_secs(60),
            poll: PollSettings::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            replicate_api_token: secret("REPLICATE_API_TOKEN"),
            luma_api_key: secret("LUMA_API_KEY"),
            runway_api_key: secret("RUNWAY_API_KEY"),
            pika_api_key: secret("PIKA_API_KEY"),
            elevenlabs_api_key: secret("ELEVENLABS_API_KEY"),
            replicate_base_url: std::env::var("REPLICATE_BASE_URL")
                .unwrap_or(defaults.replicate_base_url),
            luma_base_url: std::env::var("LUMA_BASE_URL").unwrap_or(defaults.luma_base_url),
            runway_base_url: std::env::var("RUNWAY_BASE_URL").unwrap_or(defaults.runway_base_url),
            pika_base_url: std::env::var("PIKA_BASE_URL").unwrap_or(defaults.pika_base_url),
            elevenlabs_base_url: std::env::var("ELEVENLABS_BASE_URL")
                .unwrap_or(defaults.elevenlabs_base_url),
            request_timeout: Duration::from_secs(
                std::env::var("PROVIDER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            poll: PollSettings {
                interval: Duration::from_secs(
                    std::env::var("PROVIDER_POLL_INTERVAL_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(5),
                ),
                max_wait: Duration::from_secs(
                    std::env::var("PROVIDER_MAX_POLL_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(600),
                ),
            },
        }
    }

    /// Build the shared HTTP client every adapter uses.
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .unwrap_or_default()
    }
}

fn secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
