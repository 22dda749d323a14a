//! Routes a strategy to its backend adapter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vgen_models::Backend;

use crate::error::{GenerationError, GenerationResult};
use crate::provider::GenerationRequest;
use crate::registry::ProviderRegistry;
use crate::strategy::Strategy;

/// Normalised result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub media_url: String,
    pub cost_cents: u32,
    pub backend: Backend,
    pub model: String,
    pub external_id: String,
}

/// Invokes the adapter selected by a strategy. Never retries: a partial
/// failure may already have been billed, so redelivery is left to the queue.
#[derive(Clone)]
pub struct Dispatcher {
    registry: ProviderRegistry,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: ProviderRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        strategy: &Strategy,
        image_ref: &str,
    ) -> GenerationResult<DispatchResult> {
        let provider = self.registry.get(strategy.backend)?;
        let request = GenerationRequest::from_strategy(strategy, image_ref);

        info!(
            backend = %strategy.backend,
            style = %strategy.style,
            aspect_ratio = %strategy.aspect_ratio,
            duration_seconds = strategy.duration_seconds,
            "Dispatching generation"
        );

        let output = match tokio::time::timeout(self.timeout, provider.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                backend: strategy.backend,
                seconds: self.timeout.as_secs(),
            }),
        }
        .map_err(|e| {
            warn!(backend = %strategy.backend, error = %e, "Generation failed");
            e
        })?;

        Ok(DispatchResult {
            media_url: output.media_url,
            cost_cents: strategy.cost_cents,
            backend: strategy.backend,
            model: strategy.backend.model().to_string(),
            external_id: output.external_id,
        })
    }
}
