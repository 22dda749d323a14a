//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// How often the progress stream re-reads the job
    pub progress_poll_interval: Duration,
    /// How often the stalled-job sweep runs
    pub stall_sweep_interval: Duration,
    /// A PROCESSING job untouched for this long is considered stalled
    pub stall_threshold: Duration,
    /// Lifetime of signed download URLs
    pub download_url_ttl: Duration,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_body_size: 1024 * 1024, // 1MB
            progress_poll_interval: Duration::from_secs(2),
            stall_sweep_interval: Duration::from_secs(60),
            stall_threshold: Duration::from_secs(1800),
            download_url_ttl: Duration::from_secs(3600),
            environment: "development".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT", defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS", defaults.rate_limit_rps),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            max_body_size: env_parse("MAX_BODY_SIZE", defaults.max_body_size),
            progress_poll_interval: Duration::from_secs(env_parse(
                "PROGRESS_POLL_INTERVAL_SECS",
                2,
            )),
            stall_sweep_interval: Duration::from_secs(env_parse("STALL_SWEEP_INTERVAL_SECS", 60)),
            stall_threshold: Duration::from_secs(env_parse("STALL_THRESHOLD_SECS", 1800)),
            download_url_ttl: Duration::from_secs(env_parse("DOWNLOAD_URL_TTL_SECS", 3600)),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.progress_poll_interval, Duration::from_secs(2));
        assert_eq!(config.stall_threshold, Duration::from_secs(1800));
        assert!(!config.is_production());
    }

    #[test]
    fn test_is_production_ignores_case() {
        let config = ApiConfig {
            environment: "Production".into(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
    }
}
