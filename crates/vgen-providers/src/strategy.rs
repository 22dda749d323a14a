//! Pure generation strategy selection.
//!
//! A [`Strategy`] is recomputed for every job attempt from the job's style,
//! model preference, budget and settings. Nothing here touches the network.

use serde::{Deserialize, Serialize};
use vgen_models::{AspectRatio, Backend, BudgetLevel, Job, JobSettings, VideoStyle};

use crate::policy::{aspect_ratio_for, default_duration, BudgetPolicy, CostTable};
use crate::prompt::prompt_for;

/// Everything strategy selection looks at.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub style: VideoStyle,
    pub model_preference: Option<Backend>,
    pub budget: Option<BudgetLevel>,
    pub settings: &'a JobSettings,
}

impl<'a> StrategyInput<'a> {
    pub fn for_job(job: &'a Job) -> Self {
        Self {
            style: job.style,
            model_preference: job.model_preference,
            budget: job.settings.budget,
            settings: &job.settings,
        }
    }
}

/// The resolved (backend, prompt, aspect ratio, cost) tuple for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub backend: Backend,
    pub style: VideoStyle,
    pub budget: BudgetLevel,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
    /// Free-form quality hint some backends understand ("low", "medium", "high").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    pub cost_cents: u32,
}

/// Strategy selection with a configurable backend policy and cost table.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    policy: BudgetPolicy,
    costs: CostTable,
}

impl StrategySelector {
    pub fn new(policy: BudgetPolicy, costs: CostTable) -> Self {
        Self { policy, costs }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// Pick the backend. An explicit preference always wins; every backend accepts every style.
    pub fn backend_for(&self, model_preference: Option<Backend>, budget: BudgetLevel) -> Backend {
        model_preference.unwrap_or_else(|| self.policy.backend_for(budget))
    }

    pub fn select(&self, input: &StrategyInput<'_>) -> Strategy {
        let budget = input.budget.unwrap_or_default();
        let backend = self.backend_for(input.model_preference, budget);
        let settings = input.settings;

        let prompt = match settings.prompt_override() {
            Some(custom) => custom.to_string(),
            None => prompt_for(
                input.style,
                &settings.product_title,
                &settings.product_description,
            ),
        };

        Strategy {
            backend,
            style: input.style,
            budget,
            prompt,
            aspect_ratio: settings
                .aspect_ratio
                .unwrap_or_else(|| aspect_ratio_for(input.style)),
            duration_seconds: settings
                .duration_seconds
                .filter(|d| *d > 0)
                .unwrap_or_else(|| default_duration(backend)),
            quality: settings.quality.clone(),
            cost_cents: self.costs.cost_cents(backend, budget),
        }
    }
}

/// Select a strategy with the default policy and cost table.
pub fn select_strategy(input: &StrategyInput<'_>) -> Strategy {
    StrategySelector::default().select(input)
}
