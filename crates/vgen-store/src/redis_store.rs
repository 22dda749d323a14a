//! Redis store backend.
//!
//! Layout:
//! - `{prefix}:job:{id}`: hash with `doc` (JSON), `status` and `version`
//! - `{prefix}:jobs:status:{status}`: set of job ids per status
//! - `{prefix}:video:job:{job_id}`: video JSON, written with NX
//! - `{prefix}:control:paused`: pause flag
//! - `{prefix}:product:{project}:{product}`: product snapshots written by the catalog sync
//!
//! Scripts declare every key they touch in `KEYS`. On Redis Cluster the
//! prefix must be a hash tag (for example `{vgen}`) so the keys of one
//! script share a slot.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};
use vgen_models::{Job, JobId, JobStatus, Video, VideoId};

use crate::backend::{ControlStore, JobStore, VideoInsert, VideoStore};
use crate::catalog::{ImageSource, ProductSnapshot};
use crate::error::{StoreError, StoreResult};

const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
redis.call('HSET', KEYS[1], 'doc', ARGV[1], 'status', ARGV[2], 'version', ARGV[3])
redis.call('SADD', KEYS[2], ARGV[4])
return 1
";

// KEYS[1] job hash, KEYS[2..] status sets named by ARGV[6..]
const REPLACE_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], 'version')
if not current then return -1 end
if current ~= ARGV[1] then return 0 end
local old = redis.call('HGET', KEYS[1], 'status')
redis.call('HSET', KEYS[1], 'doc', ARGV[2], 'status', ARGV[3], 'version', ARGV[4])
if old ~= ARGV[3] then
  for i = 2, #KEYS do
    local status = ARGV[i + 4]
    if status == old then redis.call('SREM', KEYS[i], ARGV[5]) end
    if status == ARGV[3] then redis.call('SADD', KEYS[i], ARGV[5]) end
  end
end
return 1
";

// KEYS[1] job hash, KEYS[2..] status sets named by ARGV[2..]
const DELETE_SCRIPT: &str = r"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then return 0 end
for i = 2, #KEYS do
  if ARGV[i] == status then redis.call('SREM', KEYS[i], ARGV[1]) end
end
redis.call('DEL', KEYS[1])
return 1
";

const REMOVE_VIDEO_SCRIPT: &str = r"
local doc = redis.call('GET', KEYS[1])
if not doc then return 0 end
if cjson.decode(doc)['id'] ~= ARGV[1] then return 0 end
redis.call('DEL', KEYS[1])
return 1
";

pub struct RedisStore {
    client: redis::Client,
    prefix: String,
    insert: redis::Script,
    replace: redis::Script,
    delete: redis::Script,
    remove_video: redis::Script,
}

impl RedisStore {
    pub fn new(redis_url: &str, prefix: impl Into<String>) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            prefix: prefix.into(),
            insert: redis::Script::new(INSERT_SCRIPT),
            replace: redis::Script::new(REPLACE_SCRIPT),
            delete: redis::Script::new(DELETE_SCRIPT),
            remove_video: redis::Script::new(REMOVE_VIDEO_SCRIPT),
        })
    }

    /// Create from `REDIS_URL` and `STORE_KEY_PREFIX`.
    pub fn from_env() -> StoreResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let prefix = std::env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| "vgen".to_string());
        Self::new(&url, prefix)
    }

    async fn conn(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    /// Write a product snapshot (used by the catalog sync and local tooling).
    pub async fn put_product(&self, product: &ProductSnapshot) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let doc = serde_json::to_string(product)?;
        conn.set::<_, _, ()>(
            self.product_key(&product.project_ref, &product.product_ref),
            doc,
        )
        .await?;
        Ok(())
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn status_key(&self, status: JobStatus) -> String {
        format!("{}:jobs:status:{}", self.prefix, status.as_str())
    }

    fn video_key(&self, job_id: &JobId) -> String {
        format!("{}:video:job:{}", self.prefix, job_id)
    }

    fn paused_key(&self) -> String {
        format!("{}:control:paused", self.prefix)
    }

    fn product_key(&self, project_ref: &str, product_ref: &str) -> String {
        format!("{}:product:{}:{}", self.prefix, project_ref, product_ref)
    }
}

#[async_trait]
impl JobStore for RedisStore {
    async fn insert(&self, job: &Job) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let doc = serde_json::to_string(job)?;

        let inserted: i64 = self
            .insert
            .key(self.job_key(&job.id))
            .key(self.status_key(job.status))
            .arg(doc)
            .arg(job.status.as_str())
            .arg(job.version)
            .arg(job.id.as_str())
            .invoke_async(&mut conn)
            .await?;

        if inserted == 0 {
            return Err(StoreError::AlreadyExists(format!("job {}", job.id)));
        }
        debug!(job_id = %job.id, "Inserted job");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        let mut conn = self.conn().await?;
        let doc: Option<String> = conn.hget(self.job_key(id), "doc").await?;
        doc.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    async fn replace(&self, job: &Job, expected_version: u64) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let doc = serde_json::to_string(job)?;

        let mut invocation = self.replace.prepare_invoke();
        invocation.key(self.job_key(&job.id));
        for status in JobStatus::ALL {
            invocation.key(self.status_key(*status));
        }
        invocation
            .arg(expected_version)
            .arg(doc)
            .arg(job.status.as_str())
            .arg(job.version)
            .arg(job.id.as_str());
        for status in JobStatus::ALL {
            invocation.arg(status.as_str());
        }
        let outcome: i64 = invocation.invoke_async(&mut conn).await?;

        match outcome {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(StoreError::not_found(format!("job {}", job.id))),
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.smembers(self.status_key(status)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hget(self.job_key(&JobId::from_string(id.as_str())), "doc");
        }
        let docs: Vec<Option<String>> = pipe.query_async(&mut conn).await?;

        let mut jobs = Vec::with_capacity(docs.len());
        for doc in docs.into_iter().flatten() {
            let job: Job = serde_json::from_str(&doc)?;
            // The index is updated in the same script as the hash, but a
            // concurrent write may land between SMEMBERS and HGET.
            if job.status == status {
                jobs.push(job);
            }
        }
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let mut invocation = self.delete.prepare_invoke();
        invocation.key(self.job_key(id));
        for status in JobStatus::ALL {
            invocation.key(self.status_key(*status));
        }
        invocation.arg(id.as_str());
        for status in JobStatus::ALL {
            invocation.arg(status.as_str());
        }
        let removed: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(removed == 1)
    }
}

#[async_trait]
impl VideoStore for RedisStore {
    async fn insert_if_absent(&self, video: Video) -> StoreResult<VideoInsert> {
        let mut conn = self.conn().await?;
        let key = self.video_key(&video.job_ref);
        let doc = serde_json::to_string(&video)?;

        let created: bool = conn.set_nx(&key, doc).await?;
        if created {
            info!(job_id = %video.job_ref, video_id = %video.id, "Created video record");
            return Ok(VideoInsert::Created(video));
        }

        let existing: String = conn.get(&key).await?;
        Ok(VideoInsert::Existing(serde_json::from_str(&existing)?))
    }

    async fn get_by_job(&self, job_id: &JobId) -> StoreResult<Option<Video>> {
        let mut conn = self.conn().await?;
        let doc: Option<String> = conn.get(self.video_key(job_id)).await?;
        doc.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    async fn remove(&self, job_id: &JobId, video_id: &VideoId) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = self
            .remove_video
            .key(self.video_key(job_id))
            .arg(video_id.as_str())
            .invoke_async(&mut conn)
            .await?;
        if removed == 1 {
            info!(job_id = %job_id, video_id = %video_id, "Removed video record");
        }
        Ok(removed == 1)
    }
}

#[async_trait]
impl ControlStore for RedisStore {
    async fn is_paused(&self) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(self.paused_key()).await?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn set_paused(&self, paused: bool) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(self.paused_key(), if paused { "1" } else { "0" })
            .await?;
        info!(paused, "Updated system pause flag");
        Ok(())
    }
}

#[async_trait]
impl ImageSource for RedisStore {
    async fn product(
        &self,
        project_ref: &str,
        product_ref: &str,
    ) -> StoreResult<Option<ProductSnapshot>> {
        let mut conn = self.conn().await?;
        let doc: Option<String> = conn.get(self.product_key(project_ref, product_ref)).await?;
        doc.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }
}
