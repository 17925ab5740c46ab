//! Google Gemini AI provider implementation.
//!
//! This module provides the [`GeminiProvider`] which implements the [`AIProvider`]
//! trait for Google's Gemini API (<https://ai.google.dev/>).

use std::time::Duration;

use super::AIProvider;
use super::provider::CompletionRequest;
use super::reply::extract_reply_text;
use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default Gemini API endpoint.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

/// Default model to use.
const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Gemini API request structures
#[derive(Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "candidateCount")]
    candidate_count: u32,
    #[serde(rename = "stopSequences", skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

// Gemini API response structures
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

impl GeminiResponse {
    /// Text of the first candidate, unless it was blocked by safety filters.
    fn first_text(&self) -> Option<String> {
        self.candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|c| {
                if let Some(reason) = &c.finish_reason
                    && (reason == "SAFETY" || reason == "BLOCKED")
                {
                    warn!("Gemini reply blocked: {}", reason);
                    return None;
                }
                c.content.as_ref()
            })
            .and_then(|content| content.parts.as_ref())
            .and_then(|parts| parts.first())
            .map(|p| p.text.clone())
    }
}

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// The model to use (e.g., "gemini-2.0-flash", "gemini-flash-lite-latest").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Base URL for the API (useful for proxies or custom endpoints).
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl GeminiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GeminiConfigBuilder {
        GeminiConfigBuilder::default()
    }
}

/// Builder for [`GeminiConfig`].
#[derive(Default)]
pub struct GeminiConfigBuilder {
    model: Option<String>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl GeminiConfigBuilder {
    /// Set the model to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Set a custom base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GeminiConfig {
        GeminiConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
        }
    }
}

/// Google Gemini AI provider.
///
/// # Example
///
/// ```rust,ignore
/// use lex_mapping::ai::{GeminiProvider, GeminiConfig};
///
/// let provider = GeminiProvider::new("your-api-key")?;
///
/// let config = GeminiConfig::builder()
///     .model("gemini-2.0-flash")
///     .build();
/// let provider = GeminiProvider::with_config("your-api-key", config)?;
/// ```
pub struct GeminiProvider {
    api_key: String,
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, GeminiConfig::default())
    }

    /// Create a new Gemini provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            api_key: api_key.into(),
            config,
            client,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let system_instruction = (!request.system_prompt.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: request.system_prompt.clone(),
            }],
        });

        GeminiRequest {
            system_instruction,
            contents: vec![Content {
                role: Some("user".to_owned()),
                parts: vec![Part {
                    text: request.user_prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.options.temperature,
                max_output_tokens: request.options.max_output_tokens,
                candidate_count: request.options.completion_count,
                stop_sequences: request.options.stop_sequence.iter().cloned().collect(),
            },
        }
    }

    /// Gemini answers with `candidates`; gateways in front of it may rewrite
    /// the reply into the chat-completions shape or a bare string.
    fn extract_text(body: &serde_json::Value) -> Result<String> {
        if body.get("candidates").is_some() {
            let response: GeminiResponse = serde_json::from_value(body.clone())?;
            return response
                .first_text()
                .ok_or_else(|| anyhow!("No response content from Gemini API"));
        }
        extract_reply_text(body)
    }
}

impl AIProvider for GeminiProvider {
    fn invoke(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.build_request(request);

        // Build URL: {base_url}{model}:generateContent?key={api_key}
        let url = format!(
            "{}{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Gemini API error {}: {}",
                response.status(),
                response.text()?
            ));
        }

        let reply: serde_json::Value = response.json()?;
        Self::extract_text(&reply)
    }

    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::CompletionOptions;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // GeminiResponse parsing tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_valid_response_structure() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "billing"}], "role": "model"},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(GeminiProvider::extract_text(&body).unwrap(), "billing");
    }

    #[test]
    fn test_blocked_response_is_error() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "billing"}]},
                "finishReason": "SAFETY"
            }]
        });
        assert!(GeminiProvider::extract_text(&body).is_err());
    }

    #[test]
    fn test_empty_candidates_is_error() {
        assert!(GeminiProvider::extract_text(&json!({"candidates": []})).is_err());
        assert!(GeminiProvider::extract_text(&json!({"candidates": null})).is_err());
    }

    #[test]
    fn test_chat_completion_shape_is_accepted() {
        let body = json!({"choices": [{"message": {"content": "usage"}}]});
        assert_eq!(GeminiProvider::extract_text(&body).unwrap(), "usage");
    }

    // -------------------------------------------------------------------------
    // Request body tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_build_request_maps_options() {
        let provider = GeminiProvider::new("test-key").unwrap();
        let request = CompletionRequest::new(
            "system",
            "user",
            CompletionOptions {
                temperature: 0.3,
                max_output_tokens: 500,
                completion_count: 1,
                stop_sequence: Some("END".to_string()),
            },
        );

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "system");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 500);
        assert_eq!(body["generationConfig"]["candidateCount"], 1);
        assert_eq!(body["generationConfig"]["stopSequences"][0], "END");
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = GeminiConfig::builder().build();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_provider_name_and_model() {
        let provider = GeminiProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "Gemini");
        assert_eq!(provider.model(), Some(DEFAULT_MODEL));
    }
}
