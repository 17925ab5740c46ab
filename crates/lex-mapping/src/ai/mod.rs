//! Advisory agent boundary.
//!
//! This module provides a trait-based abstraction for AI providers, allowing
//! the classifier, mapper and validation pass to work with multiple LLM
//! backends.
//!
//! # Feature Flag
//!
//! The concrete HTTP providers require the `ai` feature flag. The
//! [`AIProvider`] trait and request types are always available for custom
//! implementations (and test doubles).
//!
//! ```toml
//! # Enable HTTP providers (default)
//! lex-mapping = { version = "0.1", features = ["ai"] }
//!
//! # Bring your own provider
//! lex-mapping = { version = "0.1", default-features = false }
//! ```
//!
//! # Reply normalization
//!
//! Providers return either a chat-completions object
//! (`choices[0].message.content`) or a bare string. Each adapter collapses its
//! reply to a single `String` with [`extract_reply_text`] before anything is
//! parsed.

// Provider trait is always available (for custom implementations)
mod provider;
mod reply;
pub use provider::{AIProvider, CompletionOptions, CompletionRequest};
pub use reply::{extract_reply_body, extract_reply_text};

// Concrete providers require the "ai" feature
#[cfg(feature = "ai")]
mod gemini;
#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use gemini::{GeminiConfig, GeminiConfigBuilder, GeminiProvider};

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
