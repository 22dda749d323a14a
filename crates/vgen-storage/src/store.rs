//! The object storage capability.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    /// Durable reference recorded as the video's media location.
    pub url: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Time-limited download URL.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}
