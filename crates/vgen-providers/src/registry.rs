//! Backend → adapter registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use vgen_models::Backend;

use crate::adapters::{LumaProvider, PikaProvider, ReplicateProvider, RunwayProvider};
use crate::config::ProvidersConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::provider::VideoGenerationProvider;

/// Named implementations of [`VideoGenerationProvider`], resolved by backend.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Backend, Arc<dyn VideoGenerationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every backend that has credentials.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let client = config.http_client();
        let mut registry = Self::new();

        if let Some(token) = &config.replicate_api_token {
            for backend in [Backend::Sora, Backend::Kling] {
                if let Some(provider) = ReplicateProvider::new(
                    backend,
                    client.clone(),
                    token.clone(),
                    config.replicate_base_url.clone(),
                    config.poll,
                ) {
                    registry.register(Arc::new(provider));
                }
            }
        }
        if let Some(key) = &config.luma_api_key {
            registry.register(Arc::new(LumaProvider::new(
                client.clone(),
                key.clone(),
                config.luma_base_url.clone(),
                config.poll,
            )));
        }
        if let Some(key) = &config.runway_api_key {
            registry.register(Arc::new(RunwayProvider::new(
                client.clone(),
                key.clone(),
                config.runway_base_url.clone(),
                config.poll,
            )));
        }
        if let Some(key) = &config.pika_api_key {
            registry.register(Arc::new(PikaProvider::new(
                client,
                key.clone(),
                config.pika_base_url.clone(),
                config.poll,
            )));
        }

        let available: Vec<&str> = registry.backends().iter().map(|b| b.as_str()).collect();
        if available.is_empty() {
            warn!("No video generation backends configured");
        } else {
            info!(backends = ?available, "Video generation backends registered");
        }

        registry
    }

    /// Add or replace the adapter for its backend.
    pub fn register(&mut self, provider: Arc<dyn VideoGenerationProvider>) {
        self.providers.insert(provider.backend(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn VideoGenerationProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, backend: Backend) -> GenerationResult<Arc<dyn VideoGenerationProvider>> {
        self.providers
            .get(&backend)
            .cloned()
            .ok_or(GenerationError::BackendUnavailable(backend))
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.providers.contains_key(&backend)
    }

    /// Registered backends in a stable order.
    pub fn backends(&self) -> Vec<Backend> {
        Backend::ALL
            .iter()
            .copied()
            .filter(|b| self.providers.contains_key(b))
            .collect()
    }
}
