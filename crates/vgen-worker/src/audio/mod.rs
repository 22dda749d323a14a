//! Optional voice-over stage.
//!
//! Voice choice, script, speech synthesis and mux each fail on their own.
//! Any failure degrades to the silent video; the job never fails here.

mod script;
mod voice;

pub use script::{word_budget, ScriptInput, ScriptWriter, TemplateScriptWriter};
pub use voice::{KeywordVoiceSelector, VoiceSelector};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use vgen_media::{MediaError, Muxer};
use vgen_models::{Job, VoiceSelection};
use vgen_providers::{TextToSpeechProvider, TtsError, AUDIO_COST_CENTS};

/// Clip length assumed when the video duration cannot be read.
pub const FALLBACK_DURATION_SECS: f64 = 15.0;

#[derive(Debug, Error)]
pub enum AudioStageError {
    #[error("voice selection failed: {0}")]
    Voice(String),

    #[error("script generation failed: {0}")]
    Script(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] TtsError),

    #[error("speech synthesis timed out after {0}s")]
    SynthesisTimeout(u64),

    #[error("mux failed: {0}")]
    Mux(#[from] MediaError),

    #[error("no text-to-speech provider configured")]
    Unavailable,
}

impl AudioStageError {
    pub fn step(&self) -> &'static str {
        match self {
            AudioStageError::Voice(_) => "voice",
            AudioStageError::Script(_) => "script",
            AudioStageError::Synthesis(_)
            | AudioStageError::SynthesisTimeout(_)
            | AudioStageError::Unavailable => "synthesis",
            AudioStageError::Mux(_) => "mux",
        }
    }
}

/// What the audio stage did to the video.
#[derive(Debug)]
pub enum AudioOutcome {
    /// The style or the job settings ask for no audio.
    Skipped { video: Vec<u8>, reason: &'static str },
    /// Voice-over muxed in.
    Muxed {
        video: Vec<u8>,
        voice: VoiceSelection,
        cost_cents: u32,
    },
    /// A step failed; the silent video is kept.
    Degraded {
        video: Vec<u8>,
        error: AudioStageError,
    },
}

impl AudioOutcome {
    pub fn has_audio(&self) -> bool {
        matches!(self, AudioOutcome::Muxed { .. })
    }

    pub fn cost_cents(&self) -> u32 {
        match self {
            AudioOutcome::Muxed { cost_cents, .. } => *cost_cents,
            _ => 0,
        }
    }

    pub fn voice(&self) -> Option<&VoiceSelection> {
        match self {
            AudioOutcome::Muxed { voice, .. } => Some(voice),
            _ => None,
        }
    }

    pub fn video(&self) -> &[u8] {
        match self {
            AudioOutcome::Skipped { video, .. }
            | AudioOutcome::Muxed { video, .. }
            | AudioOutcome::Degraded { video, .. } => video,
        }
    }

    pub fn into_video(self) -> Vec<u8> {
        match self {
            AudioOutcome::Skipped { video, .. }
            | AudioOutcome::Muxed { video, .. }
            | AudioOutcome::Degraded { video, .. } => video,
        }
    }
}

#[derive(Clone)]
pub struct AudioPipeline {
    voices: Arc<dyn VoiceSelector>,
    scripts: Arc<dyn ScriptWriter>,
    tts: Option<Arc<dyn TextToSpeechProvider>>,
    muxer: Arc<dyn Muxer>,
    tts_timeout: Duration,
}

impl AudioPipeline {
    pub fn new(
        tts: Option<Arc<dyn TextToSpeechProvider>>,
        muxer: Arc<dyn Muxer>,
        tts_timeout: Duration,
    ) -> Self {
        Self {
            voices: Arc::new(KeywordVoiceSelector),
            scripts: Arc::new(TemplateScriptWriter),
            tts,
            muxer,
            tts_timeout,
        }
    }

    pub fn muxer(&self) -> &Arc<dyn Muxer> {
        &self.muxer
    }

    pub fn with_voice_selector(mut self, voices: Arc<dyn VoiceSelector>) -> Self {
        self.voices = voices;
        self
    }

    pub fn with_script_writer(mut self, scripts: Arc<dyn ScriptWriter>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Whether this job gets a voice-over at all.
    pub fn wants_audio(job: &Job) -> bool {
        job.style.is_audio_eligible() && job.settings.audio_enabled()
    }

    /// Add a voice-over to `video`. Never fails; see `AudioOutcome`.
    pub async fn run(&self, job: &Job, video: Vec<u8>) -> AudioOutcome {
        if !job.style.is_audio_eligible() {
            return AudioOutcome::Skipped {
                video,
                reason: "style has no voice-over",
            };
        }
        if !job.settings.audio_enabled() {
            return AudioOutcome::Skipped {
                video,
                reason: "audio disabled for job",
            };
        }

        match self.voice_over(job, &video).await {
            Ok(Some((muxed, voice))) => AudioOutcome::Muxed {
                video: muxed,
                voice,
                cost_cents: AUDIO_COST_CENTS,
            },
            Ok(None) => AudioOutcome::Skipped {
                video,
                reason: "empty script",
            },
            Err(error) => {
                warn!(
                    job_id = %job.id,
                    step = error.step(),
                    error = %error,
                    "Audio stage degraded, keeping silent video"
                );
                metrics::counter!(crate::metrics::names::AUDIO_DEGRADED_TOTAL, "step" => error.step())
                    .increment(1);
                AudioOutcome::Degraded { video, error }
            }
        }
    }

    async fn voice_over(
        &self,
        job: &Job,
        video: &[u8],
    ) -> Result<Option<(Vec<u8>, VoiceSelection)>, AudioStageError> {
        let tts = self.tts.as_ref().ok_or(AudioStageError::Unavailable)?;
        let settings = &job.settings;

        let voice = self
            .voices
            .select(&settings.product_title, &settings.product_description)?;

        let duration = match self.muxer.duration(video).await {
            Ok(secs) if secs > 0.0 => secs,
            Ok(_) | Err(_) => settings
                .duration_seconds
                .map(f64::from)
                .unwrap_or(FALLBACK_DURATION_SECS),
        };

        let script = self.scripts.write(&ScriptInput {
            style: job.style,
            duration_seconds: duration,
            title: &settings.product_title,
            description: &settings.product_description,
        })?;
        if script.trim().is_empty() {
            return Ok(None);
        }
        debug!(job_id = %job.id, voice = %voice, words = script.split_whitespace().count(), "Synthesizing voice-over");

        let speech = tokio::time::timeout(self.tts_timeout, tts.synthesize(&script, &voice))
            .await
            .map_err(|_| AudioStageError::SynthesisTimeout(self.tts_timeout.as_secs()))??;

        let muxed = self.muxer.mux(video, &speech).await?;
        Ok(Some((muxed, voice)))
    }
}
