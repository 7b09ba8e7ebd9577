/// Prompt sent to the provider for one idea.
pub const RECOMMENDATION_PROMPT: &str =
    "User idea: {idea}\nGenerate structured recommendations, improvements, and next steps.";

/// Canned recommendations used when no provider key is configured.
pub const FALLBACK_RECOMMENDATIONS: &str = "AI key not configured. Example recommendations for: {idea}\n\n\
    1) Define scope.\n2) Choose tech stack.\n3) Build MVP.";
