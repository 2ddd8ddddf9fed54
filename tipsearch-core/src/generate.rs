//! Generation invocation — hosted model client for NL→SQL.
//!
//! Provides a `SqlGenerator` trait with one production implementation,
//! `ClaudeClient`, which speaks the Anthropic Messages API shape. Sampling
//! temperature is pinned to zero so repeated questions produce the same SQL
//! as far as the hosted model allows; determinism of the remote model itself
//! is not guaranteed here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ModelConfig;
use crate::prompt::Prompt;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Abstraction over the hosted text-generation endpoint.
///
/// The pipeline depends on this trait rather than a concrete client so tests
/// can substitute stubs and spies.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Submit the prompt and return the raw completion text, fence-stripped
    /// and trimmed. Any remote failure (transport, non-2xx, timeout,
    /// malformed body) is a `GenerationError`.
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;

    /// Model identifier for logging.
    fn model_id(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Empty completion in response")]
    EmptyCompletion,

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Messages API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// ClaudeClient
// ============================================================================

/// Hosted generation client — calls an Anthropic Messages-style endpoint.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    config: ModelConfig,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, config: ModelConfig) -> Result<Self, GenerationError> {
        Self::with_base_url(api_key, config, "https://api.anthropic.com".to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        api_key: String,
        config: ModelConfig,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        if api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
            base_url,
        })
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let url = format!("{}/v1/messages", self.base_url);

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            system: prompt.system.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Generation API error");

            return Err(GenerationError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response.json().await?;

        if let Some(usage) = &body.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Generation token usage"
            );
        }

        let text = body
            .content
            .first()
            .map(|b| b.text.as_str())
            .unwrap_or("");

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        Ok(text.to_string())
    }
}

#[async_trait]
impl SqlGenerator for ClaudeClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let raw = self.invoke(prompt).await?;
        Ok(strip_code_fences(&raw))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Strip surrounding markdown code fences and whitespace from a completion.
/// Cosmetic normalization only — the gate is the security control.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```sql", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ModelConfig {
        ModelConfig {
            model: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 1000,
            timeout_seconds: 5,
        }
    }

    fn mock_completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{ "type": "text", "text": text }],
            "usage": { "input_tokens": 812, "output_tokens": 37 }
        })
    }

    #[test]
    fn strip_code_fences_removes_markdown() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT 1;\n```"),
            "SELECT 1;"
        );
        assert_eq!(strip_code_fences("  SELECT 1;  "), "SELECT 1;");
        assert_eq!(strip_code_fences("SELECT 1;"), "SELECT 1;");
    }

    #[tokio::test]
    async fn generate_posts_prompt_and_returns_sql() {
        let mock_server = MockServer::start().await;
        let client = ClaudeClient::with_base_url(
            "test-api-key".to_string(),
            test_config(),
            mock_server.uri(),
        )
        .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion(
                "SELECT * FROM tip_reports ORDER BY created_on DESC;",
            )))
            .mount(&mock_server)
            .await;

        let prompt = crate::prompt::build_prompt("latest reports");
        let sql = client.generate(&prompt).await.expect("generation failed");
        assert_eq!(sql, "SELECT * FROM tip_reports ORDER BY created_on DESC;");
    }

    #[tokio::test]
    async fn generate_strips_fences_from_completion() {
        let mock_server = MockServer::start().await;
        let client = ClaudeClient::with_base_url(
            "test-api-key".to_string(),
            test_config(),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion(
                "```sql\nSELECT * FROM tip_reports;\n```",
            )))
            .mount(&mock_server)
            .await;

        let prompt = crate::prompt::build_prompt("everything");
        let sql = client.generate(&prompt).await.unwrap();
        assert_eq!(sql, "SELECT * FROM tip_reports;");
    }

    #[tokio::test]
    async fn generate_surfaces_api_error() {
        let mock_server = MockServer::start().await;
        let client = ClaudeClient::with_base_url(
            "test-api-key".to_string(),
            test_config(),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "error": { "type": "overloaded_error", "message": "Overloaded" }
            })))
            .mount(&mock_server)
            .await;

        let prompt = crate::prompt::build_prompt("anything");
        let result = client.generate(&prompt).await;

        match result {
            Err(GenerationError::Api { code, message }) => {
                assert_eq!(code, 529);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn generate_rejects_empty_completion() {
        let mock_server = MockServer::start().await;
        let client = ClaudeClient::with_base_url(
            "test-api-key".to_string(),
            test_config(),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [],
                "usage": { "input_tokens": 10, "output_tokens": 0 }
            })))
            .mount(&mock_server)
            .await;

        let prompt = crate::prompt::build_prompt("anything");
        let result = client.generate(&prompt).await;
        assert!(matches!(result, Err(GenerationError::EmptyCompletion)));
    }

    #[test]
    fn missing_api_key_fails_construction() {
        let result = ClaudeClient::new(String::new(), test_config());
        assert!(matches!(result, Err(GenerationError::MissingApiKey)));
    }
}
