//! Dataset Category Classification and Column Mapping Library
//!
//! Maps uploaded tabular datasets onto a fixed set of standard columns with
//! the help of an LLM, keeping the user in control of the final result.
//!
//! # Overview
//!
//! - **Category Identification**: Classify a dataset as billing, usage,
//!   support or other from its column names
//! - **Column Mapping**: Suggest which input column fills each standard column
//! - **Validate and Retry**: Every suggestion is checked by a second advisory
//!   call and retried a bounded number of times
//! - **Reconciliation**: Edit the suggestion (or start from scratch) without
//!   ever mapping one input column twice, then confirm once every mandatory
//!   column is set
//! - **Export**: Rename the confirmed columns and write the dataset as CSV
//!
//! Model output is never trusted: replies are parsed defensively and
//! malformed output degrades to "nothing found" instead of an error.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_mapping::{MappingConfig, MappingSession, SchemaRegistry, dataset};
//! use lex_mapping::ai::OpenRouterProvider;
//! use std::sync::Arc;
//!
//! let df = dataset::load_dataset("billing.csv")?;
//! let provider = Arc::new(OpenRouterProvider::new(api_key)?);
//! let registry = Arc::new(SchemaRegistry::builtin()?);
//! let config = MappingConfig::default();
//!
//! let mut session = MappingSession::new(provider, registry, &config, dataset::column_names(&df));
//! session.identify_category()?;
//! session.confirm_category(None)?;
//!
//! let suggestion = session.suggest_mapping()?;
//! println!("Validated: {} ({})", suggestion.is_valid, suggestion.message);
//!
//! if let Some(reconciler) = session.reconciler_mut() {
//!     reconciler.set("DueDate", Some("due_dt"))?;
//! }
//! let confirmed = session.confirm_mapping()?.clone();
//! let path = dataset::export_mapped(df, &confirmed, &config.output_dir, &config.output_name)?;
//! ```
//!
//! # AI Providers
//!
//! Advisory calls go through the [`ai::AIProvider`] trait. Implemented
//! providers:
//!
//! - [`ai::OpenRouterProvider`] - OpenRouter and other OpenAI-compatible APIs
//! - [`ai::GeminiProvider`] - Google Gemini API
//!
//! To implement your own provider, see the [`ai`] module documentation.
//!
//! # Configuration
//!
//! Use [`MappingConfig`] to tune sampling options and retry bounds:
//!
//! ```rust,ignore
//! use lex_mapping::{MappingConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! let config = MappingConfig::builder()
//!     .retry(RetryPolicy::new(2, Duration::from_secs(1)))
//!     .schema_path("config/standard_columns.json")
//!     .output_dir("mapped")
//!     .build()?;
//! ```

pub mod agents;
pub mod ai;
pub mod config;
pub mod dataset;
pub mod error;
pub mod parser;
pub mod progress;
pub mod reconcile;
pub mod retry;
pub mod schema;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use agents::{
    AdvisoryAgent, CategoryClassifier, ClassificationTask, ColumnMapper, MappingTask,
    mapping_stats,
};
pub use config::{ConfigValidationError, MappingConfig, MappingConfigBuilder, RetryPolicy};
pub use error::{MappingError, Result as MappingResult, ResultExt};
pub use parser::{parse_category, parse_mapping, parse_validation};
pub use progress::{
    CancellationToken, ClosureProgressReporter, MappingStage, ProgressReporter, ProgressUpdate,
};
pub use reconcile::{ConfirmedMapping, MappingReconciler, Seed};
pub use retry::{RetryOutcome, RetryStatus, ValidateAndRetry};
pub use schema::{SchemaRegistry, StandardSchema};
pub use session::{MappingSession, SessionSummary};
pub use types::{Category, ColumnMapping, MappingStats, ValidationOutcome};
