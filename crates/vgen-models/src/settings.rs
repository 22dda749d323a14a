//! Per-job generation settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{AspectRatio, BudgetLevel};

/// Free-form settings bag captured at submission.
///
/// The typed fields are the ones the pipeline reads; anything else the
/// caller sends is preserved in `extra` and round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSettings {
    /// Requested clip length in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,

    /// Explicit aspect ratio, overrides the style policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,

    /// Prompt override, replaces the style template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,

    /// `Some(false)` disables the voice-over stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_audio: Option<bool>,

    /// Product title snapshot
    #[serde(default)]
    pub product_title: String,

    /// Product description snapshot
    #[serde(default)]
    pub product_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetLevel>,

    /// Output quality hint ("low", "medium", "high")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobSettings {
    pub fn with_product(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.product_title = title.into();
        self.product_description = description.into();
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_budget(mut self, budget: BudgetLevel) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.generate_audio = Some(false);
        self
    }

    /// Audio is on unless explicitly disabled.
    pub fn audio_enabled(&self) -> bool {
        self.generate_audio != Some(false)
    }

    /// Custom prompt, ignoring blank overrides.
    pub fn prompt_override(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_are_preserved() {
        let json = r#"{"duration_seconds":10,"product_title":"Mug","music":"lofi"}"#;
        let settings: JobSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.duration_seconds, Some(10));
        assert_eq!(settings.extra.get("music").unwrap(), "lofi");

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["music"], "lofi");
    }

    #[test]
    fn test_audio_enabled_by_default() {
        assert!(JobSettings::default().audio_enabled());
        assert!(!JobSettings::default().without_audio().audio_enabled());
    }

    #[test]
    fn test_blank_prompt_override_is_ignored() {
        let settings = JobSettings::default().with_custom_prompt("   ");
        assert_eq!(settings.prompt_override(), None);
        let settings = JobSettings::default().with_custom_prompt(" spin it ");
        assert_eq!(settings.prompt_override(), Some("spin it"));
    }

    #[test]
    fn test_aspect_ratio_accepts_ratio_strings() {
        let settings: JobSettings = serde_json::from_str(r#"{"aspect_ratio":"9:16"}"#).unwrap();
        assert_eq!(settings.aspect_ratio, Some(AspectRatio::Portrait));
    }
}
