//! Durable queue on Redis Streams.
//!
//! Layout:
//! - `stream_name`: ready payloads, read through a consumer group
//! - `delayed_key`: sorted set of payloads waiting out a backoff delay, scored by due time (ms)
//! - `dlq_stream_name`: dead-lettered payloads with reason and original message id
//! - `vgen:dedup:{key}`: idempotency markers, cleared when the delivery is settled

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, GenerateVideoJob};
use crate::queue::{DurableQueue, QueueStats};

const DEDUP_TTL_SECS: u64 = 3600;
const PROMOTE_BATCH: usize = 100;

/// Moves due payloads from the delayed set into the stream in one step.
const PROMOTE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
for _, payload in ipairs(due) do
  redis.call('ZREM', KEYS[1], payload)
  redis.call('XADD', KEYS[2], '*', 'job', payload)
end
return #due
";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Sorted set holding delayed redeliveries
    pub delayed_key: String,
    /// Deliveries allowed before dead-lettering
    pub max_attempts: u32,
    /// First backoff delay
    pub backoff_base: Duration,
    /// Backoff cap
    pub backoff_max: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vgen:jobs".to_string(),
            consumer_group: "vgen:workers".to_string(),
            dlq_stream_name: "vgen:dlq".to_string(),
            delayed_key: "vgen:delayed".to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_millis(2000),
            backoff_max: Duration::from_secs(60),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            delayed_key: std::env::var("QUEUE_DELAYED_KEY").unwrap_or(defaults.delayed_key),
            max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            backoff_base: std::env::var("QUEUE_BACKOFF_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_base),
            backoff_max: std::env::var("QUEUE_BACKOFF_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_max),
        }
    }

    pub fn backoff_policy(&self) -> crate::BackoffPolicy {
        crate::BackoffPolicy::new(self.max_attempts, self.backoff_base, self.backoff_max)
    }
}

/// Redis Streams queue client.
pub struct RedisQueue {
    client: redis::Client,
    config: QueueConfig,
    promote: redis::Script,
}

impl RedisQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            promote: redis::Script::new(PROMOTE_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Liveness probe for readiness checks.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    fn dedup_key(job: &GenerateVideoJob) -> String {
        format!("vgen:dedup:{}", job.idempotency_key())
    }

    /// Parse stream entries, acking payloads that cannot be decoded.
    async fn parse_entries(
        &self,
        entries: Vec<redis::streams::StreamId>,
    ) -> QueueResult<Vec<Delivery>> {
        let mut deliveries = Vec::new();

        for entry in entries {
            let message_id = entry.id.clone();
            let parsed = match entry.map.get("job") {
                Some(redis::Value::BulkString(payload)) => {
                    serde_json::from_slice::<GenerateVideoJob>(payload).map_err(|e| e.to_string())
                }
                _ => Err("missing job field".to_string()),
            };

            match parsed {
                Ok(job) => deliveries.push(Delivery::new(message_id, job)),
                Err(e) => {
                    warn!("Failed to parse job payload {}: {}", message_id, e);
                    // Ack the malformed message to prevent reprocessing
                    self.settle(&message_id, None).await.ok();
                }
            }
        }

        Ok(deliveries)
    }

    /// XACK + XDEL, plus dedup cleanup when the payload is known.
    async fn settle(&self, message_id: &str, job: Option<&GenerateVideoJob>) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .ignore()
            .cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .ignore();
        if let Some(job) = job {
            pipe.cmd("DEL").arg(Self::dedup_key(job)).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        Ok(())
    }
}

#[async_trait]
impl DurableQueue for RedisQueue {
    async fn enqueue(&self, job: GenerateVideoJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(&job)?;
        let idempotency_key = job.idempotency_key();
        let dedup_key = Self::dedup_key(&job);

        let fresh: bool = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        if !fresh {
            warn!("Duplicate job rejected: {}", idempotency_key);
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let added: Result<String, redis::RedisError> = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await;

        let message_id = match added {
            Ok(id) => id,
            Err(e) => {
                // Leave no marker behind so the caller can enqueue again.
                let _: Result<(), _> = conn.del(&dedup_key).await;
                return Err(e.into());
            }
        };

        info!(
            "Enqueued job {} with message ID {}",
            job.job_id, message_id
        );

        Ok(message_id)
    }

    async fn dequeue(
        &self,
        consumer: &str,
        block: Duration,
        max: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Option<redis::streams::StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(max.max(1))
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let entries = result
            .map(|reply| reply.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();
        let deliveries = self.parse_entries(entries).await?;

        for delivery in &deliveries {
            debug!(
                "Consumed job {} (delivery {})",
                delivery.job.job_id, delivery.job.delivery
            );
        }
        Ok(deliveries)
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.settle(&delivery.message_id, Some(&delivery.job)).await?;
        debug!("Acknowledged job: {}", delivery.message_id);
        Ok(())
    }

    async fn retry_later(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let next = delivery.job.redelivered();
        let payload = serde_json::to_string(&next)?;
        let due_ms = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&self.config.delayed_key)
            .arg(due_ms)
            .arg(&payload)
            .ignore()
            .cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&delivery.message_id)
            .ignore()
            .cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(&delivery.message_id)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        info!(
            "Scheduled redelivery {} of job {} in {:?}",
            next.delivery, next.job_id, delay
        );
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(&delivery.job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(reason)
            .arg("original_id")
            .arg(&delivery.message_id)
            .arg("failed_at")
            .arg(Utc::now().to_rfc3339())
            .query_async::<()>(&mut conn)
            .await?;

        self.settle(&delivery.message_id, Some(&delivery.job)).await?;

        warn!("Moved job {} to DLQ: {}", delivery.job.job_id, reason);
        Ok(())
    }

    async fn promote_due(&self) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let promoted: usize = self
            .promote
            .key(&self.config.delayed_key)
            .key(&self.config.stream_name)
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await?;

        if promoted > 0 {
            debug!("Promoted {} delayed jobs", promoted);
        }
        Ok(promoted)
    }

    async fn reclaim_stale(
        &self,
        consumer: &str,
        min_idle: Duration,
        max: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let min_idle_ms = min_idle.as_millis() as u64;

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(max.max(1))
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut claim = redis::cmd("XCLAIM");
        claim
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(min_idle_ms);
        for entry in &pending.ids {
            claim.arg(&entry.id);
        }
        let claimed: redis::streams::StreamClaimReply = claim.query_async(&mut conn).await?;

        let mut deliveries = self.parse_entries(claimed.ids).await?;
        for delivery in deliveries.iter_mut() {
            // Crashed consumers never reschedule, so count the takeover as a delivery.
            let times = pending
                .ids
                .iter()
                .find(|p| p.id == delivery.message_id)
                .map(|p| p.times_delivered as u32)
                .unwrap_or(delivery.job.delivery);
            delivery.job.delivery = delivery.job.delivery.max(times);
            info!(
                "Claimed pending job {} (delivery {})",
                delivery.job.job_id, delivery.job.delivery
            );
        }

        Ok(deliveries)
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let stream_len: u64 = conn.xlen(&self.config.stream_name).await?;
        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;
        let delayed: u64 = conn.zcard(&self.config.delayed_key).await?;
        let dead: u64 = conn.xlen(&self.config.dlq_stream_name).await?;

        let in_flight = pending.count() as u64;
        Ok(QueueStats {
            ready: stream_len.saturating_sub(in_flight),
            delayed,
            in_flight,
            dead_lettered: dead,
        })
    }
}
