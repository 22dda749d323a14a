//! Application state.

use std::sync::Arc;

use anyhow::Context;
use vgen_providers::StrategySelector;
use vgen_queue::{DurableQueue, RedisQueue};
use vgen_storage::{ObjectStore, S3ObjectStore};
use vgen_store::{
    ControlStore, ImageSource, JobRepository, JobService, JobStore, RedisStore, VideoStore,
};

use crate::config::ApiConfig;

/// Storage and queue handles the API is built on.
pub struct Backends {
    pub jobs: Arc<dyn JobStore>,
    pub videos: Arc<dyn VideoStore>,
    pub control: Arc<dyn ControlStore>,
    pub images: Arc<dyn ImageSource>,
    pub queue: Arc<dyn DurableQueue>,
    pub objects: Arc<dyn ObjectStore>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: JobService,
    pub jobs: JobRepository,
    pub videos: Arc<dyn VideoStore>,
    pub control: Arc<dyn ControlStore>,
    pub queue: Arc<dyn DurableQueue>,
    pub objects: Arc<dyn ObjectStore>,
    pub selector: StrategySelector,
    /// Set when objects live in S3/R2, for the readiness probe.
    pub bucket: Option<Arc<S3ObjectStore>>,
}

impl AppState {
    /// Connect to Redis and object storage using environment configuration.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = Arc::new(RedisStore::from_env().context("Failed to create job store")?);
        store.ping().await.context("Job store is unreachable")?;

        let queue = RedisQueue::from_env().context("Failed to create queue")?;
        queue.init().await.context("Failed to initialize queue")?;

        let bucket = Arc::new(
            S3ObjectStore::from_env()
                .await
                .context("Failed to create object store")?,
        );

        let mut state = Self::from_backends(
            config,
            Backends {
                jobs: store.clone(),
                videos: store.clone(),
                control: store.clone(),
                images: store,
                queue: Arc::new(queue),
                objects: bucket.clone(),
            },
        );
        state.bucket = Some(bucket);
        Ok(state)
    }

    pub fn from_backends(config: ApiConfig, backends: Backends) -> Self {
        let jobs = JobRepository::new(backends.jobs);
        let service = JobService::new(jobs.clone(), Arc::clone(&backends.queue), backends.images);
        Self {
            config,
            service,
            jobs,
            videos: backends.videos,
            control: backends.control,
            queue: backends.queue,
            objects: backends.objects,
            selector: StrategySelector::default(),
            bucket: None,
        }
    }
}
