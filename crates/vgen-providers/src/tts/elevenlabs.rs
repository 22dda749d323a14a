//! ElevenLabs text-to-speech adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use vgen_models::{VoiceAge, VoiceGender, VoiceSelection};

use super::TextToSpeechProvider;
use crate::config::ProvidersConfig;
use crate::error::TtsError;

const MODEL_ID: &str = "eleven_turbo_v2_5";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.5,
            use_speaker_boost: true,
        }
    }
}

/// Stock ElevenLabs voice for a (gender, age) pair.
pub fn voice_id_for(gender: VoiceGender, age: VoiceAge) -> &'static str {
    match (gender, age) {
        (VoiceGender::Female, VoiceAge::Young) => "21m00Tcm4TlvDq8ikWAM",
        (VoiceGender::Female, VoiceAge::Professional) => "EXAVITQu4vr4xnSDxMaL",
        (VoiceGender::Female, VoiceAge::Mature) => "MF3mGyEYCl7XYWbV9V6O",
        (VoiceGender::Male, VoiceAge::Young) => "pNInz6obpgDQGcFmaJgB",
        (VoiceGender::Male, VoiceAge::Professional) => "VR6AewLTigWG4xSOukaG",
        (VoiceGender::Male, VoiceAge::Mature) => "ErXwobaYiN019PkySvjV",
    }
}

pub struct ElevenLabsProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsProvider {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &ProvidersConfig) -> Option<Self> {
        config.elevenlabs_api_key.as_ref().map(|key| {
            Self::new(
                config.http_client(),
                key.clone(),
                config.elevenlabs_base_url.clone(),
            )
        })
    }
}

#[async_trait]
impl TextToSpeechProvider for ElevenLabsProvider {
    async fn synthesize(&self, text: &str, voice: &VoiceSelection) -> Result<Vec<u8>, TtsError> {
        let voice_id = voice_id_for(voice.gender, voice.age);
        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);

        debug!(voice_id = voice_id, voice = %voice, chars = text.len(), "Requesting speech");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: MODEL_ID,
                voice_settings: VoiceSettings::default(),
            })
            .send()
            .await
            .map_err(|e| TtsError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::from_http_status(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::Request(e.to_string()))?;
        if bytes.is_empty() {
            return Err(TtsError::EmptyAudio);
        }

        Ok(bytes.to_vec())
    }
}
