/// LLM Client: the single point of entry for text-generation calls.
///
/// No other module talks to the provider directly. Callers depend on the
/// `TextGenerator` trait so the provider can be swapped out in tests.
///
/// One request per call, 30 second timeout, no retries.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// Provider seam. Implementations return the provider's raw JSON response.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Value, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Gemini `generateContent` client. The API key travels in the `key` query parameter.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_url: String, api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Value, LlmError> {
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let value: Value = response.json().await?;
        debug!("Gemini call succeeded");
        Ok(value)
    }
}

/// Text of the first part of the first candidate, if the response has one.
pub fn first_candidate_text(response: &Value) -> Option<&str> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    /// Serves `body` with `status`, or echoes `"<key>|<prompt>"` as a candidate when
    /// `body` is `None`.
    async fn spawn_provider(status: StatusCode, body: Option<Value>) -> String {
        let app = Router::new().route(
            "/generate",
            post(
                move |Query(query): Query<HashMap<String, String>>, Json(req): Json<Value>| {
                    let body = body.clone();
                    async move {
                        let key = query.get("key").cloned().unwrap_or_default();
                        let prompt = req["contents"][0]["parts"][0]["text"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string();
                        let echoed = json!({
                            "candidates": [{"content": {"parts": [{"text": format!("{key}|{prompt}")}]}}]
                        });
                        (status, Json(body.unwrap_or(echoed)))
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/generate")
    }

    #[tokio::test]
    async fn test_sends_key_and_prompt() {
        let url = spawn_provider(StatusCode::OK, None).await;
        let client = GeminiClient::new(url, "secret".to_string()).unwrap();

        let response = client.generate("hello").await.unwrap();
        assert_eq!(first_candidate_text(&response), Some("secret|hello"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let url = spawn_provider(
            StatusCode::TOO_MANY_REQUESTS,
            Some(json!({"error": {"message": "quota"}})),
        )
        .await;
        let client = GeminiClient::new(url, "k".to_string()).unwrap();

        match client.generate("x").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert!(message.contains("quota"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_http_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = GeminiClient::new(format!("http://{addr}/generate"), "k".into()).unwrap();

        assert!(matches!(client.generate("x").await, Err(LlmError::Http(_))));
    }

    #[test]
    fn test_first_candidate_text_missing_parts() {
        assert_eq!(first_candidate_text(&json!({"candidates": []})), None);
        assert_eq!(
            first_candidate_text(&json!({"candidates": [{"content": {"parts": []}}]})),
            None
        );
    }
}
