//! Backend policy, aspect-ratio policy and the cost table.
//!
//! All costs are integer US cents.

use serde::{Deserialize, Serialize};
use vgen_models::{AspectRatio, Backend, BudgetLevel, VideoStyle};

/// Flat charge added to a job whose voice-over was muxed.
pub const AUDIO_COST_CENTS: u32 = 5;

/// Maps a budget tier to a backend when the job has no explicit model preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPolicy {
    pub economy: Backend,
    pub standard: Backend,
    pub premium: Backend,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            economy: Backend::Pika,
            standard: Backend::Luma,
            premium: Backend::Sora,
        }
    }
}

impl BudgetPolicy {
    pub fn backend_for(&self, budget: BudgetLevel) -> Backend {
        match budget {
            BudgetLevel::Economy => self.economy,
            BudgetLevel::Standard => self.standard,
            BudgetLevel::Premium => self.premium,
        }
    }
}

/// Default frame shape for a style when settings don't override it.
pub fn aspect_ratio_for(style: VideoStyle) -> AspectRatio {
    match style {
        VideoStyle::Rotation | VideoStyle::FeatureFocus => AspectRatio::Square,
        VideoStyle::LifestyleCasual
        | VideoStyle::LifestylePremium
        | VideoStyle::ProblemSolution
        | VideoStyle::HowTo => AspectRatio::Landscape,
        VideoStyle::Testimonial | VideoStyle::InfluencerShowcase => AspectRatio::Portrait,
    }
}

/// Clip length requested from a backend when settings don't specify one.
pub fn default_duration(backend: Backend) -> u32 {
    match backend {
        Backend::Sora => 8,
        Backend::Kling | Backend::Luma | Backend::Runway => 5,
        Backend::Pika => 3,
    }
}

/// Per-clip cost estimate keyed by (backend, budget).
#[derive(Debug, Clone, Default)]
pub struct CostTable;

impl CostTable {
    pub fn new() -> Self {
        Self
    }

    pub fn cost_cents(&self, backend: Backend, budget: BudgetLevel) -> u32 {
        let (economy, standard, premium) = match backend {
            Backend::Sora => (250, 500, 1000),
            Backend::Kling => (150, 300, 600),
            Backend::Luma => (100, 200, 400),
            Backend::Runway => (200, 400, 800),
            Backend::Pika => (50, 100, 200),
        };

        match budget {
            BudgetLevel::Economy => economy,
            BudgetLevel::Standard => standard,
            BudgetLevel::Premium => premium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BudgetPolicy::default();
        assert_eq!(policy.backend_for(BudgetLevel::Economy), Backend::Pika);
        assert_eq!(policy.backend_for(BudgetLevel::Standard), Backend::Luma);
        assert_eq!(policy.backend_for(BudgetLevel::Premium), Backend::Sora);
    }

    #[test]
    fn test_aspect_policy() {
        assert_eq!(aspect_ratio_for(VideoStyle::Rotation), AspectRatio::Square);
        assert_eq!(aspect_ratio_for(VideoStyle::HowTo), AspectRatio::Landscape);
        assert_eq!(aspect_ratio_for(VideoStyle::Testimonial), AspectRatio::Portrait);
        assert_eq!(
            aspect_ratio_for(VideoStyle::InfluencerShowcase),
            AspectRatio::Portrait
        );
    }

    #[test]
    fn test_cost_increases_with_budget() {
        let table = CostTable::new();
        for backend in Backend::ALL {
            let economy = table.cost_cents(*backend, BudgetLevel::Economy);
            let standard = table.cost_cents(*backend, BudgetLevel::Standard);
            let premium = table.cost_cents(*backend, BudgetLevel::Premium);
            assert!(economy < standard && standard < premium, "{backend}");
        }
        assert_eq!(table.cost_cents(Backend::Sora, BudgetLevel::Standard), 500);
    }
}
