//! Durable job queue.
//!
//! This crate provides:
//! - The `DurableQueue` contract used by the submission path and the worker pool
//! - A Redis Streams implementation with delayed redelivery and a dead-letter stream
//! - An in-process implementation for single-node runs and tests
//! - The exponential backoff policy applied to redeliveries

pub mod backoff;
pub mod error;
pub mod job;
pub mod memory;
pub mod queue;
pub mod redis_queue;

pub use backoff::BackoffPolicy;
pub use error::{QueueError, QueueResult};
pub use job::{Delivery, GenerateVideoJob};
pub use memory::MemoryQueue;
pub use queue::{DeadLetter, DurableQueue, QueueStats};
pub use redis_queue::{QueueConfig, RedisQueue};
