//! Fetching generated media from provider URLs.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` into memory. Every failure is a `WorkerError::Download`.
    async fn download(&self, url: &str) -> WorkerResult<Vec<u8>>;
}

/// Streams the body over HTTP with a deadline and a size cap.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
}

impl HttpDownloader {
    pub fn new(client: Client, timeout: Duration, max_bytes: u64) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    async fn fetch(&self, url: &str) -> WorkerResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkerError::download(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::download(format!(
                "GET {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(WorkerError::download(format!(
                    "media is {} bytes, limit is {}",
                    len, self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WorkerError::download(format!("read failed: {}", e)))?;
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(WorkerError::download(format!(
                    "media exceeds {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(WorkerError::download(format!("GET {} returned no data", url)));
        }
        Ok(body)
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> WorkerResult<Vec<u8>> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch(url))
            .await
            .map_err(|_| {
                WorkerError::download(format!(
                    "timed out after {}s fetching {}",
                    self.timeout.as_secs(),
                    url
                ))
            })??;

        debug!(url, size_bytes = bytes.len(), "Downloaded generated media");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(max_bytes: u64) -> HttpDownloader {
        HttpDownloader::new(Client::new(), Duration::from_secs(5), max_bytes)
    }

    #[tokio::test]
    async fn test_downloads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;

        let bytes = downloader(1024)
            .download(&format!("{}/out.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 64);
    }

    #[tokio::test]
    async fn test_http_error_is_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = downloader(1024)
            .download(&format!("{}/missing.mp4", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Download(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let err = downloader(1024)
            .download(&format!("{}/big.mp4", server.uri()))
            .await
            .unwrap_err();
        assert!(err.is_job_fatal());
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 8])
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let slow = HttpDownloader::new(Client::new(), Duration::from_millis(50), 1024);
        let err = slow
            .download(&format!("{}/slow.mp4", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
