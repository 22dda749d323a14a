//! Video generation worker.
//!
//! Pulls generation payloads off the durable queue and drives each job from
//! PENDING to COMPLETED or FAILED: strategy selection, provider dispatch,
//! download, optional voice-over, upload and the guarded completion.

pub mod audio;
pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod executor;
pub mod finalizer;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod rate_limit;

pub use audio::{AudioOutcome, AudioPipeline, AudioStageError};
pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use download::{HttpDownloader, MediaDownloader};
pub use error::{WorkerError, WorkerResult};
pub use executor::{DeliveryHandler, DeliveryOutcome, JobExecutor};
pub use finalizer::Finalizer;
pub use logging::JobLogger;
pub use pipeline::JobPipeline;
pub use rate_limit::JobRateLimiter;
