//! Progress reporting and cancellation support.
//!
//! Advisory calls are the slow, network-bound part of a session. A host (CLI
//! spinner, desktop UI) can observe them through a [`ProgressReporter`] and
//! abandon a session with a [`CancellationToken`]. Cancellation is coarse: it
//! is honoured between retry attempts, never in the middle of one.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_mapping::{CancellationToken, ClosureProgressReporter, ValidateAndRetry};
//! use std::sync::Arc;
//!
//! let token = CancellationToken::new();
//! let orchestrator = ValidateAndRetry::new(validator, policy, options)
//!     .cancellation_token(token.clone())
//!     .progress_reporter(Arc::new(ClosureProgressReporter::new(|update| {
//!         println!("[{}] {}", update.stage.display_name(), update.message);
//!     })));
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a mapping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStage {
    /// Asking the advisory agent for a category
    Classifying,
    /// Asking the advisory agent for a column mapping
    Mapping,
    /// Secondary validation pass over a candidate
    Validating,
    /// Waiting before the next attempt
    Retrying,
    /// Candidate accepted or attempts exhausted
    Complete,
    /// Session abandoned between attempts
    Cancelled,
}

impl MappingStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Classifying => "Identifying Category",
            Self::Mapping => "Mapping Columns",
            Self::Validating => "Validating",
            Self::Retrying => "Retrying",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Progress update emitted by the retry orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: MappingStage,

    /// Zero-based attempt number, when the update belongs to an attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: MappingStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            attempt: None,
            message: message.into(),
        }
    }

    /// Creates an update tied to a specific attempt.
    pub fn for_attempt(stage: MappingStage, attempt: u32, message: impl Into<String>) -> Self {
        Self {
            stage,
            attempt: Some(attempt),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(MappingStage::Complete, message)
    }

    pub fn cancelled() -> Self {
        Self::new(MappingStage::Cancelled, "Cancelled by user")
    }
}

/// Trait for receiving progress updates.
///
/// Implementations must be `Send + Sync` so a session can be driven from a
/// background thread while the UI thread renders updates.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for abandoning a session between attempts.
///
/// Uses an atomic boolean internally, so it is cheap to clone and safe to
/// share across threads. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Takes effect before the next attempt starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or a clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another session.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
