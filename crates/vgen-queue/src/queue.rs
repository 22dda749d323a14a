//! The durable queue contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueResult;
use crate::job::{Delivery, GenerateVideoJob};

/// At-least-once queue between the submission path and the worker pool.
///
/// A delivery stays owned by its consumer until it is acked, rescheduled
/// with `retry_later`, or dead-lettered. Deliveries whose consumer vanished
/// come back through `reclaim_stale`.
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Enqueue a payload. Fails with `QueueError::Unavailable` instead of
    /// dropping it when the broker cannot be reached.
    async fn enqueue(&self, job: GenerateVideoJob) -> QueueResult<String>;

    /// Wait up to `block` for at most `max` deliveries.
    async fn dequeue(&self, consumer: &str, block: Duration, max: usize)
        -> QueueResult<Vec<Delivery>>;

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Acknowledge this delivery and schedule the next one after `delay`.
    async fn retry_later(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()>;

    /// Park the payload in the dead-letter store.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()>;

    /// Move delayed payloads whose time has come back to the ready queue.
    async fn promote_due(&self) -> QueueResult<usize>;

    /// Take over deliveries idle for longer than `min_idle`.
    async fn reclaim_stale(
        &self,
        consumer: &str,
        min_idle: Duration,
        max: usize,
    ) -> QueueResult<Vec<Delivery>>;

    async fn stats(&self) -> QueueResult<QueueStats>;
}

/// Queue depth counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub ready: u64,
    pub delayed: u64,
    pub in_flight: u64,
    pub dead_lettered: u64,
}

/// A payload that exhausted its redeliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub job: GenerateVideoJob,
    pub reason: String,
    pub original_id: String,
    pub failed_at: DateTime<Utc>,
}
