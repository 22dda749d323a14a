//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Jobs allowed to start per rate-limit window
    pub rate_limit_max: u32,
    /// Rate-limit window
    pub rate_limit_window: Duration,
    /// How long a dequeue blocks waiting for work
    pub poll_block: Duration,
    /// Timeout for downloading generated media
    pub download_timeout: Duration,
    /// Largest generated video the worker will download
    pub max_download_bytes: u64,
    /// Upper bound on one provider call, polling included
    pub provider_timeout: Duration,
    /// Timeout for one text-to-speech request
    pub tts_timeout: Duration,
    /// Timeout for one ffmpeg/ffprobe invocation
    pub ffmpeg_timeout: Duration,
    /// How often a paused worker re-checks the pause flag
    pub pause_poll: Duration,
    /// How often the worker promotes delayed redeliveries and reclaims stale ones
    pub claim_interval: Duration,
    /// Minimum idle time before another consumer's delivery can be claimed
    pub claim_min_idle: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: String,
    /// Consumer name inside the queue's consumer group
    pub consumer_name: Option<String>,
    /// Port for the Prometheus exporter, disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(60),
            poll_block: Duration::from_millis(5000),
            download_timeout: Duration::from_secs(300),
            max_download_bytes: 512 * 1024 * 1024,
            provider_timeout: Duration::from_secs(900),
            tts_timeout: Duration::from_secs(60),
            ffmpeg_timeout: Duration::from_secs(120),
            pause_poll: Duration::from_secs(5),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            consumer_name: None,
            metrics_port: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: env_parse::<usize>("WORKER_MAX_CONCURRENT_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            rate_limit_max: env_parse::<u32>("WORKER_RATE_LIMIT_MAX")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.rate_limit_max),
            rate_limit_window: env_parse("WORKER_RATE_LIMIT_WINDOW_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            poll_block: env_parse("WORKER_POLL_BLOCK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_block),
            download_timeout: env_parse("WORKER_DOWNLOAD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            max_download_bytes: env_parse("WORKER_MAX_DOWNLOAD_BYTES")
                .unwrap_or(defaults.max_download_bytes),
            provider_timeout: env_parse("WORKER_PROVIDER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            tts_timeout: env_parse("WORKER_TTS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tts_timeout),
            ffmpeg_timeout: env_parse("WORKER_FFMPEG_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            pause_poll: env_parse("WORKER_PAUSE_POLL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pause_poll),
            claim_interval: env_parse("WORKER_CLAIM_INTERVAL_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            claim_min_idle: env_parse("WORKER_CLAIM_MIN_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_min_idle),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            consumer_name: std::env::var("WORKER_CONSUMER_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            metrics_port: env_parse("WORKER_METRICS_PORT"),
        }
    }
}
