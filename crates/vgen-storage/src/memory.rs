//! In-process object store for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStore, StoredObject};

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_uploads: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("object store unavailable"));
        }
        let size_bytes = data.len() as u64;
        self.objects.write().await.insert(key.to_string(), data);
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{key}"),
            size_bytes,
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::not_found(key));
        }
        Ok(format!("memory://{key}?expires={}", expires_in.as_secs()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_presign_delete() {
        let store = MemoryObjectStore::new();
        let stored = store.upload_bytes("videos/a.mp4", vec![1, 2, 3], "video/mp4").await.unwrap();
        assert_eq!(stored.size_bytes, 3);
        assert_eq!(store.get("videos/a.mp4").await, Some(vec![1, 2, 3]));

        let url = store.presign_get("videos/a.mp4", Duration::from_secs(60)).await.unwrap();
        assert_eq!(url, "memory://videos/a.mp4?expires=60");

        store.delete("videos/a.mp4").await.unwrap();
        assert!(store.keys().await.is_empty());
        assert!(store.presign_get("videos/a.mp4", Duration::from_secs(60)).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_uploads() {
        let store = MemoryObjectStore::new();
        store.set_fail_uploads(true);
        assert!(matches!(
            store.upload_bytes("k", vec![1], "video/mp4").await,
            Err(StorageError::UploadFailed(_))
        ));
    }
}
