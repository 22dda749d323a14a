//! Voice heuristic.

use vgen_models::{VoiceAge, VoiceGender, VoiceSelection};

use super::AudioStageError;

const FEMALE_KEYWORDS: &[&str] = &[
    "women", "woman", "ladies", "girl", "beauty", "makeup", "skincare", "dress", "jewelry",
    "handbag", "purse", "bra", "lingerie", "nail", "hair", "fashion", "baby", "mom", "mother",
    "maternity",
];

const MALE_KEYWORDS: &[&str] = &[
    "men", "man", "guy", "beard", "shaving", "razor", "tool", "gaming", "sports", "workout",
    "protein", "muscle", "dad", "father", "cologne",
];

const YOUNG_KEYWORDS: &[&str] = &["teen", "trending", "tiktok"];
const MATURE_KEYWORDS: &[&str] = &["luxury", "premium", "parent"];

pub trait VoiceSelector: Send + Sync {
    fn select(&self, title: &str, description: &str) -> Result<VoiceSelection, AudioStageError>;
}

/// Picks a voice from keywords in the product title and description.
///
/// Matching is by substring on the lowercased text, so "women" also counts
/// as "men". Mixed or neutral products get a female voice.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordVoiceSelector;

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

impl VoiceSelector for KeywordVoiceSelector {
    fn select(&self, title: &str, description: &str) -> Result<VoiceSelection, AudioStageError> {
        let text = format!("{} {}", title, description).to_lowercase();

        let female = mentions(&text, FEMALE_KEYWORDS);
        let male = mentions(&text, MALE_KEYWORDS);

        let (gender, rationale) = match (female, male) {
            (true, false) => (VoiceGender::Female, "Product is targeted towards women"),
            (false, true) => (VoiceGender::Male, "Product is targeted towards men"),
            _ => (
                VoiceGender::Female,
                "Neutral product - female voice converts better on social media",
            ),
        };

        let age = if mentions(&text, YOUNG_KEYWORDS) {
            VoiceAge::Young
        } else if mentions(&text, MATURE_KEYWORDS) {
            VoiceAge::Mature
        } else {
            VoiceAge::Professional
        };

        Ok(VoiceSelection {
            gender,
            age,
            rationale: rationale.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(title: &str, description: &str) -> VoiceSelection {
        KeywordVoiceSelector.select(title, description).unwrap()
    }

    #[test]
    fn test_male_product() {
        let voice = pick("Beard Oil", "Keeps your beard soft");
        assert_eq!(voice.gender, VoiceGender::Male);
        assert_eq!(voice.age, VoiceAge::Professional);
        assert_eq!(voice.rationale, "Product is targeted towards men");
    }

    #[test]
    fn test_female_product() {
        let voice = pick("Silk Dress", "Elegant evening dress");
        assert_eq!(voice.gender, VoiceGender::Female);
        assert_eq!(voice.rationale, "Product is targeted towards women");
    }

    #[test]
    fn test_women_also_matches_men() {
        let voice = pick("Running Shoes for Women", "");
        assert_eq!(voice.gender, VoiceGender::Female);
        assert!(voice.rationale.starts_with("Neutral product"));
    }

    #[test]
    fn test_neutral_product_defaults_to_female() {
        let voice = pick("Ceramic Mug", "Holds 350 ml");
        assert_eq!(voice.gender, VoiceGender::Female);
        assert!(voice.rationale.starts_with("Neutral product"));
    }

    #[test]
    fn test_age_rules() {
        assert_eq!(pick("Trending Phone Grip", "").age, VoiceAge::Young);
        assert_eq!(pick("Luxury Watch", "").age, VoiceAge::Mature);
        // young keywords win over mature ones
        assert_eq!(pick("Premium TikTok Light", "").age, VoiceAge::Young);
    }
}
