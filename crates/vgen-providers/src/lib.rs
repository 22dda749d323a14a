//! Generation strategy selection and provider capabilities.
//!
//! This crate provides:
//! - Pure strategy selection: backend policy, prompt templates, aspect ratios, cost table
//! - The `VideoGenerationProvider` capability with Replicate, Luma, Runway and Pika adapters
//! - `ProviderRegistry` and `Dispatcher`, which route a strategy to its adapter
//! - The `TextToSpeechProvider` capability with an ElevenLabs adapter

pub mod adapters;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod policy;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod strategy;
pub mod tts;

pub use config::ProvidersConfig;
pub use dispatcher::{DispatchResult, Dispatcher};
pub use error::{GenerationError, GenerationResult, TtsError};
pub use http::PollSettings;
pub use policy::{aspect_ratio_for, default_duration, BudgetPolicy, CostTable, AUDIO_COST_CENTS};
pub use prompt::prompt_for;
pub use provider::{GenerationOutput, GenerationRequest, VideoGenerationProvider};
pub use registry::ProviderRegistry;
pub use strategy::{select_strategy, Strategy, StrategyInput, StrategySelector};
pub use tts::{ElevenLabsProvider, TextToSpeechProvider};
