//! Video style, generation backend, budget and aspect ratio definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Marketing video styles a job can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoStyle {
    /// Turntable view of the product
    #[serde(alias = "360_rotation")]
    Rotation,
    /// Everyday-life scene
    LifestyleCasual,
    /// Upscale, editorial scene
    LifestylePremium,
    /// Person vouching for the product
    #[serde(alias = "ad_testimonial")]
    Testimonial,
    /// Close-ups of key features
    #[serde(alias = "ad_feature_focus")]
    FeatureFocus,
    /// Frustration, then the product as the fix
    #[serde(alias = "ad_problem_solution")]
    ProblemSolution,
    /// Step-by-step demonstration
    #[serde(alias = "how_to_use")]
    HowTo,
    /// Creator-style handheld showcase
    InfluencerShowcase,
}

impl VideoStyle {
    pub const ALL: &'static [VideoStyle] = &[
        VideoStyle::Rotation,
        VideoStyle::LifestyleCasual,
        VideoStyle::LifestylePremium,
        VideoStyle::Testimonial,
        VideoStyle::FeatureFocus,
        VideoStyle::ProblemSolution,
        VideoStyle::HowTo,
        VideoStyle::InfluencerShowcase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStyle::Rotation => "rotation",
            VideoStyle::LifestyleCasual => "lifestyle_casual",
            VideoStyle::LifestylePremium => "lifestyle_premium",
            VideoStyle::Testimonial => "testimonial",
            VideoStyle::FeatureFocus => "feature_focus",
            VideoStyle::ProblemSolution => "problem_solution",
            VideoStyle::HowTo => "how_to",
            VideoStyle::InfluencerShowcase => "influencer_showcase",
        }
    }

    /// Styles that get a synthesized voice-over when audio is not disabled.
    pub fn is_audio_eligible(&self) -> bool {
        matches!(
            self,
            VideoStyle::Testimonial
                | VideoStyle::FeatureFocus
                | VideoStyle::ProblemSolution
                | VideoStyle::HowTo
                | VideoStyle::InfluencerShowcase
        )
    }
}

impl fmt::Display for VideoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoStyle {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "rotation" | "360_rotation" => Ok(VideoStyle::Rotation),
            "lifestyle_casual" => Ok(VideoStyle::LifestyleCasual),
            "lifestyle_premium" => Ok(VideoStyle::LifestylePremium),
            "testimonial" | "ad_testimonial" => Ok(VideoStyle::Testimonial),
            "feature_focus" | "ad_feature_focus" => Ok(VideoStyle::FeatureFocus),
            "problem_solution" | "ad_problem_solution" => Ok(VideoStyle::ProblemSolution),
            "how_to" | "how_to_use" => Ok(VideoStyle::HowTo),
            "influencer_showcase" => Ok(VideoStyle::InfluencerShowcase),
            _ => Err(ParseError::Style(s.to_string())),
        }
    }
}

/// Concrete video generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// OpenAI Sora 2 hosted on Replicate
    Sora,
    /// Kling hosted on Replicate
    Kling,
    /// Luma Dream Machine
    Luma,
    /// Runway Gen-3 Alpha
    Runway,
    /// Pika
    Pika,
}

impl Backend {
    pub const ALL: &'static [Backend] = &[
        Backend::Sora,
        Backend::Kling,
        Backend::Luma,
        Backend::Runway,
        Backend::Pika,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sora => "sora",
            Backend::Kling => "kling",
            Backend::Luma => "luma",
            Backend::Runway => "runway",
            Backend::Pika => "pika",
        }
    }

    /// Model identifier recorded in video metadata.
    pub fn model(&self) -> &'static str {
        match self {
            Backend::Sora => "openai/sora-2",
            Backend::Kling => "kwaivgi/kling-v1.6-standard",
            Backend::Luma => "dream-machine",
            Backend::Runway => "gen-3-alpha",
            Backend::Pika => "pika-1.0",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sora" | "sora-2" | "openai/sora-2" => Ok(Backend::Sora),
            "kling" | "kling-1.6" => Ok(Backend::Kling),
            "luma" | "dream-machine" => Ok(Backend::Luma),
            "runway" | "gen-3-alpha" => Ok(Backend::Runway),
            "pika" => Ok(Backend::Pika),
            _ => Err(ParseError::Backend(s.to_string())),
        }
    }
}

/// Spend tier used by the default backend policy and the cost table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
    Economy,
    #[default]
    Standard,
    Premium,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetLevel::Economy => "economy",
            BudgetLevel::Standard => "standard",
            BudgetLevel::Premium => "premium",
        }
    }
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BudgetLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" => Ok(BudgetLevel::Economy),
            "standard" => Ok(BudgetLevel::Standard),
            "premium" => Ok(BudgetLevel::Premium),
            _ => Err(ParseError::Budget(s.to_string())),
        }
    }
}

/// Output frame shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 1:1
    #[serde(alias = "1:1")]
    Square,
    /// 16:9
    #[serde(alias = "16:9")]
    Landscape,
    /// 9:16
    #[serde(alias = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "square",
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
        }
    }

    /// Ratio string in the `W:H` form most backends accept.
    pub fn as_ratio(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ratio())
    }
}

impl FromStr for AspectRatio {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "square" | "1:1" => Ok(AspectRatio::Square),
            "landscape" | "16:9" => Ok(AspectRatio::Landscape),
            "portrait" | "9:16" => Ok(AspectRatio::Portrait),
            _ => Err(ParseError::AspectRatio(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown style: {0}")]
    Style(String),
    #[error("Unknown backend: {0}")]
    Backend(String),
    #[error("Unknown budget level: {0}")]
    Budget(String),
    #[error("Invalid aspect ratio: {0}, expected square, landscape, portrait or W:H")]
    AspectRatio(String),
}
