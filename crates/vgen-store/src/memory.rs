//! In-memory store backend for single-node runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use vgen_models::{Job, JobId, JobStatus, Video, VideoId};

use crate::backend::{ControlStore, JobStore, VideoInsert, VideoStore};
use crate::error::{StoreError, StoreResult};

/// Jobs, videos and control flags held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    videos: RwLock<HashMap<JobId, Video>>,
    paused: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend outage: every call fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of stored video rows for `job_id` (0 or 1).
    pub async fn video_count(&self, job_id: &JobId) -> usize {
        usize::from(self.videos.read().await.contains_key(job_id))
    }

    pub async fn all_jobs(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: &Job) -> StoreResult<()> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(format!("job {}", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        self.check()?;
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn replace(&self, job: &Job, expected_version: u64) -> StoreResult<bool> {
        self.check()?;
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = job.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::not_found(format!("job {}", job.id))),
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        self.check()?;
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        self.check()?;
        Ok(self.jobs.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn insert_if_absent(&self, video: Video) -> StoreResult<VideoInsert> {
        self.check()?;
        let mut videos = self.videos.write().await;
        if let Some(existing) = videos.get(&video.job_ref) {
            return Ok(VideoInsert::Existing(existing.clone()));
        }
        videos.insert(video.job_ref.clone(), video.clone());
        Ok(VideoInsert::Created(video))
    }

    async fn get_by_job(&self, job_id: &JobId) -> StoreResult<Option<Video>> {
        self.check()?;
        Ok(self.videos.read().await.get(job_id).cloned())
    }

    async fn remove(&self, job_id: &JobId, video_id: &VideoId) -> StoreResult<bool> {
        self.check()?;
        let mut videos = self.videos.write().await;
        match videos.get(job_id) {
            Some(video) if &video.id == video_id => {
                videos.remove(job_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ControlStore for MemoryStore {
    async fn is_paused(&self) -> StoreResult<bool> {
        self.check()?;
        Ok(self.paused.load(Ordering::SeqCst))
    }

    async fn set_paused(&self, paused: bool) -> StoreResult<()> {
        self.check()?;
        self.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }
}
