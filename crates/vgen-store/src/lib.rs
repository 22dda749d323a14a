//! Job store and submission path.
//!
//! This crate provides:
//! - Storage traits for jobs, video records and the control flags
//! - Redis and in-memory backends
//! - `JobRepository`: guarded compare-and-set transitions over any backend
//! - `JobService`: submit, query, cancel and retry

pub mod backend;
pub mod catalog;
pub mod error;
pub mod jobs;
pub mod memory;
pub mod redis_store;
pub mod service;

pub use backend::{ControlStore, JobStore, VideoInsert, VideoStore};
pub use catalog::{ImageSource, MemoryCatalog, ProductSnapshot};
pub use error::{StoreError, StoreResult};
pub use jobs::JobRepository;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use service::{BatchItem, BatchSubmitRequest, JobService, SubmitJobRequest};
