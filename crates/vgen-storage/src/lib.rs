//! Object storage for generated videos.
//!
//! Provides the `ObjectStore` capability, an S3-compatible implementation
//! (Cloudflare R2 or AWS S3) and an in-memory implementation for tests.

pub mod client;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use client::{S3ObjectStore, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use keys::{key_from_url, video_key};
pub use memory::MemoryObjectStore;
pub use store::{ObjectStore, StoredObject};
