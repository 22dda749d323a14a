//! Voice selection produced by the audio stage's heuristic.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Female,
    Male,
}

impl VoiceGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Female => "female",
            VoiceGender::Male => "male",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAge {
    Young,
    Professional,
    Mature,
}

impl VoiceAge {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceAge::Young => "young",
            VoiceAge::Professional => "professional",
            VoiceAge::Mature => "mature",
        }
    }
}

/// Voice chosen for a product, with the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VoiceSelection {
    pub gender: VoiceGender,
    pub age: VoiceAge,
    pub rationale: String,
}

impl fmt::Display for VoiceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gender.as_str(), self.age.as_str())
    }
}
