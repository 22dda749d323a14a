//! Text-to-speech capability.

mod elevenlabs;

use async_trait::async_trait;
use vgen_models::VoiceSelection;

use crate::error::TtsError;

pub use elevenlabs::{voice_id_for, ElevenLabsProvider};

#[async_trait]
pub trait TextToSpeechProvider: Send + Sync {
    /// Synthesize `text` with the selected voice, returning encoded audio (MP3).
    async fn synthesize(&self, text: &str, voice: &VoiceSelection) -> Result<Vec<u8>, TtsError>;
}
