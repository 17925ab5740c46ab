//! Error types for the classification and mapping pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Every failure
//! is scoped to the current session or request; nothing here is meant to
//! terminate the hosting process.
//!
//! Errors are serializable so that a frontend can branch on the `code` field.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the mapping pipeline.
#[derive(Error, Debug)]
pub enum MappingError {
    /// Operation was cancelled between retry attempts.
    #[error("Operation cancelled")]
    Cancelled,

    /// The requested category is not a key of the schema registry.
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    /// Column mapping was requested for a category without a standard schema.
    #[error("Invalid category '{0}': no standard schema is registered for it")]
    InvalidCategory(String),

    /// The standard column is not part of the active schema.
    #[error("Standard column '{0}' is not part of the active schema")]
    UnknownStandardColumn(String),

    /// The input column does not exist in the dataset.
    #[error("Input column '{0}' not found in dataset")]
    UnknownInputColumn(String),

    /// The input column is already assigned to a different standard column.
    #[error("Input column '{input}' is already mapped to '{standard}'")]
    InputColumnAlreadyMapped { input: String, standard: String },

    /// Confirmation was attempted while mandatory columns are still unset.
    #[error("Mandatory columns are not mapped: {}", .0.join(", "))]
    MandatoryColumnsUnmapped(Vec<String>),

    /// The mapping was already confirmed and can no longer be edited.
    #[error("Mapping has already been confirmed")]
    MappingAlreadyConfirmed,

    /// A step that needs a confirmed category was run too early.
    #[error("Category has not been confirmed yet")]
    CategoryNotConfirmed,

    /// The standard column configuration is malformed.
    #[error("Invalid schema configuration: {0}")]
    InvalidSchema(String),

    /// Dataset file format cannot be read.
    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    /// Advisory agent (LLM) call failed.
    #[error("AI client error: {0}")]
    AiClientError(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Spreadsheet reader error (only with "excel" feature).
    #[cfg(feature = "excel")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MappingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an error coming back from an [`AIProvider`](crate::ai::AIProvider).
    pub fn ai_client(err: anyhow::Error) -> Self {
        MappingError::AiClientError(format!("{err:#}"))
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            Self::InvalidCategory(_) => "INVALID_CATEGORY",
            Self::UnknownStandardColumn(_) => "UNKNOWN_STANDARD_COLUMN",
            Self::UnknownInputColumn(_) => "UNKNOWN_INPUT_COLUMN",
            Self::InputColumnAlreadyMapped { .. } => "INPUT_COLUMN_ALREADY_MAPPED",
            Self::MandatoryColumnsUnmapped(_) => "MANDATORY_COLUMNS_UNMAPPED",
            Self::MappingAlreadyConfirmed => "MAPPING_ALREADY_CONFIRMED",
            Self::CategoryNotConfirmed => "CATEGORY_NOT_CONFIRMED",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::AiClientError(_) => "AI_CLIENT_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            #[cfg(feature = "excel")]
            Self::Spreadsheet(_) => "SPREADSHEET_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error came from the advisory agent (transport or reply
    /// decoding). The retry orchestrator absorbs these as invalid candidates.
    pub fn is_advisory_failure(&self) -> bool {
        match self {
            Self::AiClientError(_) | Self::Json(_) => true,
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => true,
            Self::WithContext { source, .. } => source.is_advisory_failure(),
            _ => false,
        }
    }

    /// Check if the user can resolve this error with a different edit or choice.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Cancelled
            | Self::UnknownStandardColumn(_)
            | Self::UnknownInputColumn(_)
            | Self::InputColumnAlreadyMapped { .. }
            | Self::MandatoryColumnsUnmapped(_)
            | Self::CategoryNotConfirmed
            | Self::InvalidCategory(_)
            | Self::UnknownCategory(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Serialized as a struct with `code` and `message` fields.
impl Serialize for MappingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("MappingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| MappingError::Polars(e).with_context(context))
    }
}
