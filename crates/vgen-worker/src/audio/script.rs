//! Voice-over script templates.

use vgen_models::VideoStyle;

use super::AudioStageError;

/// Speaking rate used to size scripts, in words per minute.
pub const WORDS_PER_MINUTE: f64 = 130.0;

/// Below this many words the short template is used.
pub const SHORT_SCRIPT_WORDS: u32 = 20;

const BENEFITS: &[&str] = &[
    "It makes life so much easier.",
    "It saves you tons of time.",
    "It actually works like they say.",
    "It feels so premium and high quality.",
    "Everyone compliments it.",
];

const FALLBACK_BENEFIT: &str = "It works amazing and you'll love it!";

const FEATURES: &[&str] = &[
    "the design is sleek",
    "it's super durable",
    "the quality is insane",
];

const STEPS: &[&str] = &["get it set up", "start using it", "see the results"];

/// Product text a script is written from.
#[derive(Debug, Clone, Copy)]
pub struct ScriptInput<'a> {
    pub style: VideoStyle,
    pub duration_seconds: f64,
    pub title: &'a str,
    pub description: &'a str,
}

pub trait ScriptWriter: Send + Sync {
    /// An empty script means the style has no voice-over.
    fn write(&self, input: &ScriptInput<'_>) -> Result<String, AudioStageError>;
}

/// Fixed templates per style, sized to the clip length.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateScriptWriter;

/// Words that fit in `duration_seconds` of speech.
pub fn word_budget(duration_seconds: f64) -> u32 {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return 0;
    }
    (duration_seconds / 60.0 * WORDS_PER_MINUTE).floor() as u32
}

/// Benefit sentence, picked from the title so the same product always gets the same line.
fn benefit(title: &str, description: &str) -> &'static str {
    if description.trim().is_empty() {
        return FALLBACK_BENEFIT;
    }
    let hash = title
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
    BENEFITS[hash as usize % BENEFITS.len()]
}

fn features(count: usize) -> String {
    FEATURES
        .iter()
        .take(count)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

fn step(n: usize) -> &'static str {
    n.checked_sub(1)
        .and_then(|i| STEPS.get(i))
        .copied()
        .unwrap_or("follow the instructions")
}

impl ScriptWriter for TemplateScriptWriter {
    fn write(&self, input: &ScriptInput<'_>) -> Result<String, AudioStageError> {
        let t = input.title.trim();
        if t.is_empty() && input.style != VideoStyle::Rotation {
            return Err(AudioStageError::Script("product has no title".into()));
        }

        let short = word_budget(input.duration_seconds) < SHORT_SCRIPT_WORDS;
        let b = benefit(input.title, input.description);

        let script = match input.style {
            VideoStyle::Rotation => String::new(),
            VideoStyle::LifestyleCasual => {
                format!("Just me and my {} having the best day! {}", t, b)
            }
            VideoStyle::LifestylePremium => {
                format!("Elevate your lifestyle with {}. {} Pure luxury, pure quality.", t, b)
            }
            VideoStyle::Testimonial if short => format!(
                "Oh my god, you NEED this! {} literally changed everything. Best purchase ever!",
                t
            ),
            VideoStyle::Testimonial => format!(
                "Okay so I've been using {} for a week now and I'm obsessed! {} The quality is \
                 amazing and it's so worth it. If you've been thinking about getting one, this \
                 is your sign. Trust me, you won't regret it!",
                t, b
            ),
            VideoStyle::InfluencerShowcase if short => format!(
                "Wait, you haven't seen {} yet? Let me show you why everyone's obsessed!",
                t
            ),
            VideoStyle::InfluencerShowcase => format!(
                "Alright so everyone's been asking me about this, and yes, {} is totally worth \
                 the hype! {} I've been using it nonstop and honestly can't imagine going back. \
                 Link is in my bio if you want to check it out!",
                t, b
            ),
            VideoStyle::FeatureFocus if short => {
                format!("Three things that make {} incredible: {}", t, features(3))
            }
            VideoStyle::FeatureFocus => format!(
                "Let me show you what makes {} so special. {}. Plus, {} It's actually genius \
                 how well-designed this is!",
                t,
                capitalize(&features(3)),
                b
            ),
            VideoStyle::ProblemSolution if short => format!(
                "Struggling with this? {} solves it perfectly. Here's how it works!",
                t
            ),
            VideoStyle::ProblemSolution => format!(
                "If you've ever dealt with this problem, you need to see this! {} completely \
                 fixes it. {} Honestly wish I'd found this sooner. Game changer!",
                t, b
            ),
            VideoStyle::HowTo if short => {
                format!("Here's how to use {} the right way. Super easy, watch this!", t)
            }
            VideoStyle::HowTo => format!(
                "Okay so here's exactly how you use {}. First, {}. Then {}. And that's it! Way \
                 easier than you'd think. Let me know if you have questions!",
                t,
                step(1),
                step(2)
            ),
        };

        Ok(script)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
