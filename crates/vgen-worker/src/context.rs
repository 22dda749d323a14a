//! Shared dependencies for job processing.

use std::sync::Arc;

use vgen_providers::{Dispatcher, StrategySelector};
use vgen_queue::{BackoffPolicy, DurableQueue};
use vgen_storage::ObjectStore;
use vgen_store::{ControlStore, JobRepository, VideoStore};

use crate::audio::AudioPipeline;
use crate::download::MediaDownloader;

/// Everything a job needs, shared by all slots of the pool.
///
/// No job-specific state lives here; concurrent jobs only meet in the job
/// store and the rate limiter.
#[derive(Clone)]
pub struct WorkerContext {
    pub jobs: JobRepository,
    pub videos: Arc<dyn VideoStore>,
    pub control: Arc<dyn ControlStore>,
    pub queue: Arc<dyn DurableQueue>,
    pub backoff: BackoffPolicy,
    pub selector: StrategySelector,
    pub dispatcher: Dispatcher,
    pub downloader: Arc<dyn MediaDownloader>,
    pub audio: AudioPipeline,
    pub objects: Arc<dyn ObjectStore>,
}
