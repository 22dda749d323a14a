//! S3-compatible client (Cloudflare R2 or AWS S3).

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStore, StoredObject};

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Custom S3 API endpoint; required for R2, absent for AWS.
    pub endpoint_url: Option<String>,
    pub bucket: String,
    /// "auto" for R2
    pub region: String,
    /// Public base URL used to build media references; falls back to `s3://bucket/key`.
    pub public_url: Option<String>,
    /// Explicit credentials; when absent the default AWS provider chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: non_empty("S3_ENDPOINT_URL"),
            bucket: non_empty("S3_BUCKET")
                .ok_or_else(|| StorageError::config_error("S3_BUCKET not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url: non_empty("S3_PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string()),
            access_key_id: non_empty("S3_ACCESS_KEY_ID"),
            secret_access_key: non_empty("S3_SECRET_ACCESS_KEY"),
        })
    }

    /// Media reference recorded for a stored key.
    pub fn object_url(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base, key),
            None => format!("s3://{}/{}", self.bucket, key),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    config: StorageConfig,
}

impl S3ObjectStore {
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = Builder::from(&shared).force_path_style(config.endpoint_url.is_some());

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                builder = builder.credentials_provider(Credentials::new(
                    key_id, secret, None, None, "vgen-env",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::config_error(
                    "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
                ))
            }
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            config,
        })
    }

    pub async fn from_env() -> StorageResult<Self> {
        Self::new(StorageConfig::from_env()?).await
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|e| StorageError::config_error(format!("bucket unreachable: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let size_bytes = data.len() as u64;
        debug!("Uploading {} bytes to {}", size_bytes, key);

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(key = key, size_bytes = size_bytes, "Uploaded object");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.config.object_url(key),
            size_bytes,
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        debug!("Deleted {}", key);
        Ok(())
    }
}
