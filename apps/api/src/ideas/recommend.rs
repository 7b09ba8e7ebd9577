use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::ideas::prompts::{FALLBACK_RECOMMENDATIONS, RECOMMENDATION_PROMPT};
use crate::llm_client::{first_candidate_text, GeminiClient, LlmError, TextGenerator};

/// Upper bound, in characters, of the raw-response dump used when the provider
/// answers without any candidate text.
pub const RAW_DUMP_LIMIT: usize = 2000;

/// Produces recommendation text for an idea.
///
/// Without a provider the canned fallback is returned. With one, provider failures
/// surface as `AppError::Upstream` and are never replaced by the fallback.
#[derive(Clone)]
pub struct Recommender {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Recommender {
    pub fn offline() -> Self {
        Self { generator: None }
    }

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        match &config.gemini_api_key {
            Some(key) => {
                let client = GeminiClient::new(config.gemini_api_url.clone(), key.clone())?;
                info!("Recommendations via Gemini at {}", config.gemini_api_url);
                Ok(Self::new(Arc::new(client)))
            }
            None => {
                warn!("GEMINI_API_KEY not set, serving fallback recommendations");
                Ok(Self::offline())
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.generator.is_some()
    }

    /// Rejects blank ideas before any network activity.
    pub async fn recommend(&self, idea: &str) -> Result<String, AppError> {
        let idea = idea.trim();
        if idea.is_empty() {
            return Err(AppError::Validation("Please provide an idea.".to_string()));
        }

        let Some(generator) = &self.generator else {
            return Ok(fallback_recommendations(idea));
        };

        let prompt = RECOMMENDATION_PROMPT.replace("{idea}", idea);
        let response = generator
            .generate(&prompt)
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        Ok(extract_recommendations(&response))
    }
}

pub fn fallback_recommendations(idea: &str) -> String {
    FALLBACK_RECOMMENDATIONS.replace("{idea}", idea)
}

/// First candidate text, or a truncated pretty dump of the whole response so the
/// caller always gets something to store.
pub fn extract_recommendations(response: &Value) -> String {
    match first_candidate_text(response) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            let dump = serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string());
            dump.chars().take(RAW_DUMP_LIMIT).collect()
        }
    }
}
