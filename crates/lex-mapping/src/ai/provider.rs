//! AI provider trait for abstracting LLM interactions.
//!
//! This module defines the [`AIProvider`] trait that enables support for
//! multiple AI providers (OpenRouter, Gemini, OpenAI-compatible gateways, ...)
//! without changing the classification or mapping logic.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `ollama.rs`)
//! 2. Implement the [`AIProvider`] trait for your provider struct
//! 3. Export the provider in `src/ai/mod.rs`
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_mapping::ai::{AIProvider, CompletionOptions, CompletionRequest, OpenRouterProvider};
//!
//! let provider = OpenRouterProvider::new("your-api-key")?;
//! let request = CompletionRequest::new(
//!     "You are a data categorizer.",
//!     "Columns: invoice_id, amount",
//!     CompletionOptions::default(),
//! );
//! let text = provider.invoke(&request)?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Sampling options sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Temperature for response generation (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_output_tokens: u32,
    /// Number of completions to request. Only the first one is read.
    pub completion_count: u32,
    /// Optional stop sequence.
    pub stop_sequence: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_output_tokens: 500,
            completion_count: 1,
            stop_sequence: None,
        }
    }
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            ..Self::default()
        }
    }
}

/// A single system + user prompt exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            options,
        }
    }
}

/// Trait for AI providers that answer advisory prompts.
///
/// Implementations turn a [`CompletionRequest`] into the raw reply text.
/// Provider-specific reply shapes must be normalized inside the adapter;
/// callers only ever see a `String`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so that a session can be moved to a
/// worker thread.
///
/// # Error Handling
///
/// Transport failures and unusable replies are returned as errors. The retry
/// orchestrator treats them as invalid candidates rather than aborting.
pub trait AIProvider: Send + Sync {
    /// Send the request and return the raw reply text.
    fn invoke(&self, request: &CompletionRequest) -> Result<String>;

    /// Get the provider name for logging and debugging.
    fn name(&self) -> &str;

    /// Get the model being used by this provider.
    ///
    /// Returns `None` if the provider doesn't expose model information.
    fn model(&self) -> Option<&str> {
        None
    }
}
