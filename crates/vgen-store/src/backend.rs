//! Storage backend traits.

use async_trait::async_trait;
use vgen_models::{Job, JobId, JobStatus, Video, VideoId};

use crate::error::StoreResult;

/// Raw job persistence with optimistic concurrency.
///
/// Status rules live in `JobRepository`; backends only guarantee that
/// `replace` is atomic against the stored `version`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, job: &Job) -> StoreResult<()>;

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Overwrite the job if the stored version equals `expected_version`.
    /// Returns `false` when another writer got there first.
    async fn replace(&self, job: &Job, expected_version: u64) -> StoreResult<bool>;

    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>>;

    async fn delete(&self, id: &JobId) -> StoreResult<bool>;
}

/// Result of an idempotent video insert.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoInsert {
    /// This call wrote the row.
    Created(Video),
    /// A row for the same job already existed; it is returned unchanged.
    Existing(Video),
}

impl VideoInsert {
    pub fn video(&self) -> &Video {
        match self {
            VideoInsert::Created(v) | VideoInsert::Existing(v) => v,
        }
    }

    pub fn into_video(self) -> Video {
        match self {
            VideoInsert::Created(v) | VideoInsert::Existing(v) => v,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, VideoInsert::Created(_))
    }
}

/// Video records, keyed by the producing job.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert unless a video for `video.job_ref` exists.
    async fn insert_if_absent(&self, video: Video) -> StoreResult<VideoInsert>;

    async fn get_by_job(&self, job_id: &JobId) -> StoreResult<Option<Video>>;

    /// Delete the job's row only while it is still `video_id`.
    /// Returns `false` when the row is gone or belongs to another writer.
    async fn remove(&self, job_id: &JobId, video_id: &VideoId) -> StoreResult<bool>;
}

/// Process-wide switches that must survive restarts.
#[async_trait]
pub trait ControlStore: Send + Sync {
    async fn is_paused(&self) -> StoreResult<bool>;

    async fn set_paused(&self, paused: bool) -> StoreResult<()>;
}
