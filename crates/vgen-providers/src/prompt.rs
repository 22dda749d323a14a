//! Style-specific prompt templates.

use vgen_models::VideoStyle;

const MAX_DETAIL_CHARS: usize = 300;

/// Build the generation prompt for a style, interpolating the product title and,
/// when present, a trimmed excerpt of its description.
pub fn prompt_for(style: VideoStyle, title: &str, description: &str) -> String {
    let title = title.trim();
    let base = match style {
        VideoStyle::Rotation => format!(
            "Professional 360 degree rotating view of {title}. Clean white studio background, \
             smooth continuous rotation, product photography style, high quality commercial video, \
             perfect lighting."
        ),
        VideoStyle::LifestyleCasual => format!(
            "{title} being used in everyday casual setting. Natural lighting, authentic lifestyle \
             photography, person using the product in their daily routine, relatable and genuine \
             atmosphere, Instagram aesthetic."
        ),
        VideoStyle::LifestylePremium => format!(
            "{title} showcased in luxurious premium setting. Golden hour lighting, high-end \
             lifestyle photography, elegant and sophisticated atmosphere, aspirational aesthetic, \
             magazine-quality production."
        ),
        VideoStyle::Testimonial => format!(
            "Person genuinely excited about {title}. Authentic testimonial style, direct to camera, \
             positive emotional reaction, relatable setting, trustworthy and honest vibe, \
             user-generated content aesthetic."
        ),
        VideoStyle::FeatureFocus => format!(
            "Close-up product demonstration of {title} key features. Professional product video, \
             detailed feature showcase, clear and informative, commercial advertisement style, \
             high production value."
        ),
        VideoStyle::ProblemSolution => format!(
            "{title} solving a problem. Before and after demonstration, clear problem \
             identification, product as the solution, engaging narrative, commercial advertisement \
             style."
        ),
        VideoStyle::HowTo => format!(
            "Step-by-step tutorial demonstrating how to use {title}. Clear instructional style, \
             helpful and informative, easy to follow, educational video format, friendly \
             demonstration."
        ),
        VideoStyle::InfluencerShowcase => format!(
            "Influencer-style first-person POV showcasing {title}. Authentic and casual vibe, ring \
             light aesthetic, talking to camera, genuine excitement, social media content style, \
             trendy and engaging."
        ),
    };

    let detail = description_excerpt(description);
    if detail.is_empty() {
        base
    } else {
        format!("{base} Product details: {detail}")
    }
}

fn description_excerpt(description: &str) -> String {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_DETAIL_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(MAX_DETAIL_CHARS).collect();
    match cut.rfind(' ') {
        Some(idx) => format!("{}...", &cut[..idx]),
        None => format!("{cut}..."),
    }
}
