//! Configuration types for the mapping pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use crate::ai::CompletionOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bounds of the validate-and-retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` means a single attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    #[serde(with = "duration_millis", rename = "retry_delay_ms")]
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Attempts including the first one.
    pub fn total_attempts(&self) -> u64 {
        u64::from(self.max_retries) + 1
    }

    /// Upper bound of advisory calls: one production and one validation call
    /// per attempt.
    pub fn max_advisory_calls(&self) -> u64 {
        2 * self.total_attempts()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration for the mapping pipeline.
///
/// Use [`MappingConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_mapping::config::{MappingConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = MappingConfig::builder()
///     .retry(RetryPolicy::new(2, Duration::from_millis(500)))
///     .output_dir("mapped")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Sampling options for category identification.
    /// Default: temperature 0.3, 100 tokens
    pub classifier: CompletionOptions,

    /// Sampling options for column mapping.
    /// Default: temperature 0.3, 500 tokens
    pub mapper: CompletionOptions,

    /// Sampling options for the validation pass.
    /// Default: temperature 0.3, 300 tokens
    pub validator: CompletionOptions,

    /// Retry bounds applied to both classification and mapping.
    /// Default: 3 retries, 3 s apart
    pub retry: RetryPolicy,

    /// JSON file with the standard columns per category.
    /// If None, the built-in schema is used.
    pub schema_path: Option<PathBuf>,

    /// Output directory for the exported dataset.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// Output file name (without extension).
    /// Default: "mapped_data"
    pub output_name: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            classifier: CompletionOptions::new(0.3, 100),
            mapper: CompletionOptions::new(0.3, 500),
            validator: CompletionOptions::new(0.3, 300),
            retry: RetryPolicy::default(),
            schema_path: None,
            output_dir: PathBuf::from("output"),
            output_name: "mapped_data".to_string(),
        }
    }
}

impl MappingConfig {
    /// Create a new configuration builder.
    pub fn builder() -> MappingConfigBuilder {
        MappingConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, options) in [
            ("classifier", &self.classifier),
            ("mapper", &self.mapper),
            ("validator", &self.validator),
        ] {
            if !(0.0..=2.0).contains(&options.temperature) {
                return Err(ConfigValidationError::InvalidTemperature {
                    field: field.to_string(),
                    value: options.temperature,
                });
            }
            if options.max_output_tokens == 0 {
                return Err(ConfigValidationError::InvalidMaxTokens(field.to_string()));
            }
            if options.completion_count == 0 {
                return Err(ConfigValidationError::InvalidCompletionCount(
                    field.to_string(),
                ));
            }
        }

        if self.output_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyOutputName);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid temperature for '{field}': {value} (must be between 0.0 and 2.0)")]
    InvalidTemperature { field: String, value: f32 },

    #[error("Invalid max output tokens for '{0}' (must be at least 1)")]
    InvalidMaxTokens(String),

    #[error("Invalid completion count for '{0}' (must be at least 1)")]
    InvalidCompletionCount(String),

    #[error("Output name must not be empty")]
    EmptyOutputName,
}

/// Builder for [`MappingConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct MappingConfigBuilder {
    classifier: Option<CompletionOptions>,
    mapper: Option<CompletionOptions>,
    validator: Option<CompletionOptions>,
    retry: Option<RetryPolicy>,
    schema_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
}

impl MappingConfigBuilder {
    /// Set the sampling options for category identification.
    pub fn classifier(mut self, options: CompletionOptions) -> Self {
        self.classifier = Some(options);
        self
    }

    /// Set the sampling options for column mapping.
    pub fn mapper(mut self, options: CompletionOptions) -> Self {
        self.mapper = Some(options);
        self
    }

    /// Set the sampling options for the validation pass.
    pub fn validator(mut self, options: CompletionOptions) -> Self {
        self.validator = Some(options);
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Load standard columns from a JSON file instead of the built-in set.
    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    /// Set the output directory for the exported dataset.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the output file name (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `MappingConfig` or an error if validation fails.
    pub fn build(self) -> Result<MappingConfig, ConfigValidationError> {
        let defaults = MappingConfig::default();
        let config = MappingConfig {
            classifier: self.classifier.unwrap_or(defaults.classifier),
            mapper: self.mapper.unwrap_or(defaults.mapper),
            validator: self.validator.unwrap_or(defaults.validator),
            retry: self.retry.unwrap_or(defaults.retry),
            schema_path: self.schema_path,
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            output_name: self.output_name.unwrap_or(defaults.output_name),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MappingConfig::default();
        assert_eq!(config.classifier.temperature, 0.3);
        assert_eq!(config.classifier.max_output_tokens, 100);
        assert_eq!(config.mapper.max_output_tokens, 500);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_delay, Duration::from_secs(3));
        assert!(config.schema_path.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = MappingConfig::builder()
            .retry(RetryPolicy::new(1, Duration::from_millis(10)))
            .output_dir("mapped")
            .output_name("billing_std")
            .build()
            .unwrap();

        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.output_dir, PathBuf::from("mapped"));
        assert_eq!(config.output_name, "billing_std");
    }

    #[test]
    fn test_validation_invalid_temperature() {
        let result = MappingConfig::builder()
            .mapper(CompletionOptions::new(3.5, 500))
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidTemperature { .. }
        ));
    }

    #[test]
    fn test_validation_zero_tokens() {
        let result = MappingConfig::builder()
            .classifier(CompletionOptions::new(0.3, 0))
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidMaxTokens(field) if field == "classifier"
        ));
    }

    #[test]
    fn test_max_advisory_calls() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_advisory_calls(), 2);
        assert_eq!(RetryPolicy::default().max_advisory_calls(), 8);
        assert_eq!(
            RetryPolicy::new(u32::MAX, Duration::ZERO).max_advisory_calls(),
            2 * (u64::from(u32::MAX) + 1)
        );
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "classifier": {"temperature": 0.1, "max_output_tokens": 50, "completion_count": 1, "stop_sequence": null},
            "mapper": {"temperature": 0.2, "max_output_tokens": 400, "completion_count": 1, "stop_sequence": null},
            "validator": {"temperature": 0.0, "max_output_tokens": 200, "completion_count": 1, "stop_sequence": null},
            "retry": {"max_retries": 2, "retry_delay_ms": 250},
            "schema_path": "config/standard_columns.json",
            "output_dir": "custom_output",
            "output_name": "my_dataset"
        }"#;

        let config: MappingConfig = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(config.retry, RetryPolicy::new(2, Duration::from_millis(250)));
        assert_eq!(config.mapper.max_output_tokens, 400);
        assert_eq!(
            config.schema_path,
            Some(PathBuf::from("config/standard_columns.json"))
        );
        assert!(config.validate().is_ok());
    }
}
