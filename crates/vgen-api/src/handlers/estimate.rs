//! Cost estimation.
//!
//! Runs the same strategy selection the worker runs, without touching any
//! provider. The audio charge assumes the voice-over succeeds.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vgen_models::{AspectRatio, Backend, BudgetLevel, JobSettings, VideoStyle};
use vgen_providers::{StrategyInput, AUDIO_COST_CENTS};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn default_count() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct EstimateRequest {
    pub style: VideoStyle,
    #[serde(default)]
    pub model_preference: Option<Backend>,
    /// Overrides `settings.budget` when present.
    #[serde(default)]
    pub budget: Option<BudgetLevel>,
    #[serde(default)]
    pub settings: JobSettings,
    /// Number of products the estimate covers.
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 100))]
    pub count: u32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct EstimateResponse {
    pub backend: Backend,
    pub model: String,
    pub budget: BudgetLevel,
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
    pub generation_cents: u32,
    pub audio_cents: u32,
    pub per_video_cents: u32,
    pub count: u32,
    pub total_cents: u32,
}

/// POST /api/estimate
pub async fn estimate_cost(
    State(state): State<AppState>,
    Json(request): Json<EstimateRequest>,
) -> ApiResult<Json<EstimateResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(Json(estimate(&state, &request)))
}

fn estimate(state: &AppState, request: &EstimateRequest) -> EstimateResponse {
    let strategy = state.selector.select(&StrategyInput {
        style: request.style,
        model_preference: request.model_preference,
        budget: request.budget.or(request.settings.budget),
        settings: &request.settings,
    });

    let audio_cents = if request.style.is_audio_eligible() && request.settings.audio_enabled() {
        AUDIO_COST_CENTS
    } else {
        0
    };
    let per_video_cents = strategy.cost_cents + audio_cents;

    EstimateResponse {
        backend: strategy.backend,
        model: strategy.backend.model().to_string(),
        budget: strategy.budget,
        aspect_ratio: strategy.aspect_ratio,
        duration_seconds: strategy.duration_seconds,
        generation_cents: strategy.cost_cents,
        audio_cents,
        per_video_cents,
        count: request.count,
        total_cents: per_video_cents.saturating_mul(request.count),
    }
}
