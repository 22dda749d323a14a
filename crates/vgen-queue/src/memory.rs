//! In-process queue.
//!
//! Same contract as the Redis queue, without durability across restarts.
//! Used by single-node deployments and the pipeline tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, GenerateVideoJob};
use crate::queue::{DeadLetter, DurableQueue, QueueStats};

struct InFlight {
    job: GenerateVideoJob,
    consumer: String,
    since: Instant,
}

#[derive(Default)]
struct Inner {
    ready: VecDeque<(String, GenerateVideoJob)>,
    delayed: Vec<(Instant, GenerateVideoJob)>,
    in_flight: HashMap<String, InFlight>,
    dead: Vec<DeadLetter>,
    dedup: HashSet<String>,
}

impl Inner {
    fn promote(&mut self, now: Instant, next_id: impl Fn() -> String) -> usize {
        let mut promoted = 0;
        let mut remaining = Vec::with_capacity(self.delayed.len());
        for (due, job) in self.delayed.drain(..) {
            if due <= now {
                self.ready.push_back((next_id(), job));
                promoted += 1;
            } else {
                remaining.push((due, job));
            }
        }
        self.delayed = remaining;
        promoted
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed.iter().map(|(due, _)| *due).min()
    }
}

/// In-memory `DurableQueue`.
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    seq: AtomicU64,
    available: AtomicBool,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a broker outage: while unavailable, every call fails with
    /// `QueueError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Payloads parked in the dead-letter list.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.lock().await.dead.clone()
    }

    fn next_id(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-0", n)
    }

    fn check_available(&self) -> QueueResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::unavailable("in-memory queue marked unavailable"))
        }
    }

    async fn take_in_flight(&self, delivery: &Delivery) -> QueueResult<GenerateVideoJob> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .in_flight
            .remove(&delivery.message_id)
            .ok_or_else(|| QueueError::DeliveryNotFound(delivery.message_id.clone()))?;
        inner.dedup.remove(&entry.job.idempotency_key());
        Ok(entry.job)
    }
}

#[async_trait]
impl DurableQueue for MemoryQueue {
    async fn enqueue(&self, job: GenerateVideoJob) -> QueueResult<String> {
        self.check_available()?;

        let key = job.idempotency_key();
        let message_id = {
            let mut inner = self.inner.lock().await;
            if !inner.dedup.insert(key.clone()) {
                warn!("Duplicate job rejected: {}", key);
                return Err(QueueError::Duplicate(key));
            }
            let id = self.next_id();
            inner.ready.push_back((id.clone(), job.clone()));
            id
        };
        self.notify.notify_waiters();

        info!("Enqueued job {} with message ID {}", job.job_id, message_id);
        Ok(message_id)
    }

    async fn dequeue(
        &self,
        consumer: &str,
        block: Duration,
        max: usize,
    ) -> QueueResult<Vec<Delivery>> {
        self.check_available()?;
        let deadline = Instant::now() + block;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_due = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                inner.promote(now, || self.next_id());

                let mut out = Vec::new();
                while out.len() < max.max(1) {
                    let Some((id, job)) = inner.ready.pop_front() else {
                        break;
                    };
                    inner.in_flight.insert(
                        id.clone(),
                        InFlight {
                            job: job.clone(),
                            consumer: consumer.to_string(),
                            since: now,
                        },
                    );
                    out.push(Delivery::new(id, job));
                }
                if !out.is_empty() {
                    debug!("Consumer {} took {} deliveries", consumer, out.len());
                    return Ok(out);
                }
                inner.next_due()
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.check_available()?;
        self.take_in_flight(delivery).await?;
        debug!("Acknowledged job: {}", delivery.message_id);
        Ok(())
    }

    async fn retry_later(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()> {
        self.check_available()?;
        let job = self.take_in_flight(delivery).await?;
        let next = job.redelivered();
        {
            let mut inner = self.inner.lock().await;
            inner.dedup.insert(next.idempotency_key());
            inner.delayed.push((Instant::now() + delay, next));
        }
        self.notify.notify_waiters();
        info!(
            "Scheduled redelivery of job {} in {:?}",
            delivery.job.job_id, delay
        );
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        self.check_available()?;
        let job = self.take_in_flight(delivery).await?;
        warn!("Moved job {} to DLQ: {}", job.job_id, reason);
        self.inner.lock().await.dead.push(DeadLetter {
            job,
            reason: reason.to_string(),
            original_id: delivery.message_id.clone(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn promote_due(&self) -> QueueResult<usize> {
        self.check_available()?;
        let promoted = self
            .inner
            .lock()
            .await
            .promote(Instant::now(), || self.next_id());
        if promoted > 0 {
            self.notify.notify_waiters();
        }
        Ok(promoted)
    }

    async fn reclaim_stale(
        &self,
        consumer: &str,
        min_idle: Duration,
        max: usize,
    ) -> QueueResult<Vec<Delivery>> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        let mut claimed = Vec::new();
        for (id, entry) in inner.in_flight.iter_mut() {
            if claimed.len() >= max {
                break;
            }
            if now.duration_since(entry.since) >= min_idle {
                info!(
                    "Claimed pending job {} from consumer {}",
                    entry.job.job_id, entry.consumer
                );
                entry.consumer = consumer.to_string();
                entry.since = now;
                entry.job = entry.job.redelivered();
                claimed.push(Delivery::new(id.clone(), entry.job.clone()));
            }
        }
        Ok(claimed)
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(QueueStats {
            ready: inner.ready.len() as u64,
            delayed: inner.delayed.len() as u64,
            in_flight: inner.in_flight.len() as u64,
            dead_lettered: inner.dead.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{Job, JobSettings, VideoStyle};

    fn payload() -> GenerateVideoJob {
        let job = Job::new(
            "prod",
            "proj",
            VideoStyle::Rotation,
            JobSettings::default(),
            vec!["img".into()],
        );
        GenerateVideoJob::for_job(&job)
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_ack() {
        let queue = MemoryQueue::new();
        let job = payload();
        queue.enqueue(job.clone()).await.unwrap();

        let deliveries = queue
            .dequeue("w1", Duration::from_millis(10), 5)
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].job, job);
        assert_eq!(queue.stats().await.unwrap().in_flight, 1);

        queue.ack(&deliveries[0]).await.unwrap();
        assert_eq!(queue.stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_duplicate_rejected_until_acked() {
        let queue = MemoryQueue::new();
        let job = payload();
        queue.enqueue(job.clone()).await.unwrap();
        assert!(matches!(
            queue.enqueue(job.clone()).await,
            Err(QueueError::Duplicate(_))
        ));

        let d = queue
            .dequeue("w1", Duration::from_millis(10), 1)
            .await
            .unwrap();
        queue.ack(&d[0]).await.unwrap();
        tokio_test::assert_ok!(queue.enqueue(job).await);
    }

    #[tokio::test]
    async fn test_unavailable_does_not_drop_silently() {
        let queue = MemoryQueue::new();
        queue.set_available(false);
        let err = queue.enqueue(payload()).await.unwrap_err();
        assert!(err.is_unavailable());

        queue.set_available(true);
        assert_eq!(queue.stats().await.unwrap().ready, 0);
    }

    #[tokio::test]
    async fn test_dequeue_times_out_empty() {
        let queue = MemoryQueue::new();
        let out = queue
            .dequeue("w1", Duration::from_millis(20), 1)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_consumer_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(MemoryQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue("w1", Duration::from_secs(5), 1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(payload()).await.unwrap();

        let out = consumer.await.unwrap().unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_later_redelivers_after_delay() {
        let queue = MemoryQueue::new();
        queue.enqueue(payload()).await.unwrap();
        let first = queue
            .dequeue("w1", Duration::from_millis(1), 1)
            .await
            .unwrap();

        queue
            .retry_later(&first[0], Duration::from_secs(4))
            .await
            .unwrap();
        assert_eq!(queue.stats().await.unwrap().delayed, 1);

        let none = queue
            .dequeue("w1", Duration::from_secs(1), 1)
            .await
            .unwrap();
        assert!(none.is_empty());

        let second = queue
            .dequeue("w1", Duration::from_secs(10), 1)
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].job.delivery, 2);
        assert_ne!(second[0].message_id, first[0].message_id);
    }

    #[tokio::test]
    async fn test_dead_letter() {
        let queue = MemoryQueue::new();
        queue.enqueue(payload()).await.unwrap();
        let d = queue
            .dequeue("w1", Duration::from_millis(1), 1)
            .await
            .unwrap();
        queue.dead_letter(&d[0], "exhausted retries").await.unwrap();

        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "exhausted retries");
        assert_eq!(queue.stats().await.unwrap().dead_lettered, 1);
        assert_eq!(queue.stats().await.unwrap().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reclaim_stale_deliveries() {
        let queue = MemoryQueue::new();
        queue.enqueue(payload()).await.unwrap();
        let d = queue
            .dequeue("crashed", Duration::from_millis(1), 1)
            .await
            .unwrap();

        let early = queue
            .reclaim_stale("w2", Duration::from_secs(60), 10)
            .await
            .unwrap();
        assert!(early.is_empty());

        tokio::time::advance(Duration::from_secs(61)).await;
        let claimed = queue
            .reclaim_stale("w2", Duration::from_secs(60), 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].message_id, d[0].message_id);
        assert_eq!(claimed[0].job.delivery, 2);

        queue.ack(&claimed[0]).await.unwrap();
    }
}
