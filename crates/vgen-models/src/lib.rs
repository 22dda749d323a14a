//! Shared data models for the video generation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their status graph and guarded transitions
//! - Video styles, generation backends, budgets and aspect ratios
//! - Persisted video records
//! - Voice selections used by the audio stage

pub mod job;
pub mod settings;
pub mod style;
pub mod video;
pub mod voice;

pub use job::{
    Job, JobId, JobSnapshot, JobStatus, Transition, TransitionError, CANCELLED_MESSAGE,
    EXHAUSTED_MESSAGE, STALLED_MESSAGE,
};
pub use settings::JobSettings;
pub use style::{AspectRatio, Backend, BudgetLevel, ParseError, VideoStyle};
pub use video::{Video, VideoId, VideoMetadata};
pub use voice::{VoiceAge, VoiceGender, VoiceSelection};
