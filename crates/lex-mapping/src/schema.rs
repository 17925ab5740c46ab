//! Registry of per-category standard columns.
//!
//! The registry is loaded once (from a JSON file or the embedded default) and
//! is read-only afterwards. The JSON shape is:
//!
//! ```json
//! { "billing": { "mandatory": ["CustomerID"], "optional": ["InvoiceID"] } }
//! ```

use crate::error::{MappingError, Result, ResultExt};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

const BUILTIN_SCHEMA: &str = include_str!("../config/standard_columns.json");

/// Mandatory and optional standard columns of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardSchema {
    mandatory: Vec<String>,
    #[serde(default)]
    optional: Vec<String>,
}

impl StandardSchema {
    /// Build a schema, rejecting duplicates and overlap between the two lists.
    pub fn new(mandatory: Vec<String>, optional: Vec<String>) -> Result<Self> {
        let schema = Self {
            mandatory,
            optional,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for name in self.mandatory.iter().chain(&self.optional) {
            if name.trim().is_empty() {
                return Err(MappingError::InvalidSchema(
                    "standard column names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(MappingError::InvalidSchema(format!(
                    "standard column '{}' is listed more than once",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn mandatory(&self) -> &[String] {
        &self.mandatory
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// All standard columns, mandatory first.
    pub fn all_columns(&self) -> impl Iterator<Item = &str> {
        self.mandatory
            .iter()
            .chain(&self.optional)
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all_columns().any(|c| c == name)
    }

    pub fn is_mandatory(&self, name: &str) -> bool {
        self.mandatory.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.mandatory.len() + self.optional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Standard schemas keyed by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    schemas: BTreeMap<Category, StandardSchema>,
}

impl SchemaRegistry {
    /// Registry backed by the embedded default configuration.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_SCHEMA).context("Failed to load built-in standard columns")
    }

    /// Load a registry from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw).context(format!("Failed to load schema {}", path.display()))
    }

    /// Parse a registry from its JSON representation.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, StandardSchema> = serde_json::from_str(raw)?;
        let mut schemas = BTreeMap::new();

        for (name, schema) in parsed {
            let category: Category = name.parse()?;
            if !category.is_identified() {
                return Err(MappingError::InvalidSchema(format!(
                    "'{}' cannot have a standard schema",
                    category
                )));
            }
            schema.validate().context(format!("Category '{}'", category))?;
            debug!(
                "Loaded schema for {}: {} mandatory, {} optional",
                category,
                schema.mandatory.len(),
                schema.optional.len()
            );
            schemas.insert(category, schema);
        }

        Ok(Self { schemas })
    }

    /// Build a registry from already constructed schemas.
    pub fn from_schemas(schemas: impl IntoIterator<Item = (Category, StandardSchema)>) -> Self {
        Self {
            schemas: schemas.into_iter().collect(),
        }
    }

    /// Look up the standard schema of a category.
    pub fn schema_for(&self, category: Category) -> Result<&StandardSchema> {
        self.schemas
            .get(&category)
            .ok_or_else(|| MappingError::UnknownCategory(category.to_string()))
    }

    /// Configured categories, in declaration order of [`Category`].
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.schemas.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_loads() {
        let registry = SchemaRegistry::builtin().unwrap();
        let categories: Vec<Category> = registry.categories().collect();
        assert_eq!(
            categories,
            vec![
                Category::Billing,
                Category::Usage,
                Category::Support,
                Category::Other
            ]
        );

        let billing = registry.schema_for(Category::Billing).unwrap();
        assert!(billing.is_mandatory("CustomerID"));
        assert!(billing.contains("InvoiceID"));
        assert!(!billing.is_mandatory("InvoiceID"));
    }

    #[test]
    fn test_none_of_these_is_unknown() {
        let registry = SchemaRegistry::builtin().unwrap();
        let err = registry.schema_for(Category::NoneOfThese).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
    }

    #[test]
    fn test_overlapping_lists_are_rejected() {
        let raw = r#"{"billing": {"mandatory": ["amount"], "optional": ["amount"]}}"#;
        let err = SchemaRegistry::from_json_str(raw).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SCHEMA");
    }

    #[test]
    fn test_unknown_category_key_is_rejected() {
        let raw = r#"{"finance": {"mandatory": ["amount"], "optional": []}}"#;
        let err = SchemaRegistry::from_json_str(raw).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
    }

    #[test]
    fn test_optional_defaults_to_empty() {
        let raw = r#"{"usage": {"mandatory": ["CustomerID"]}}"#;
        let registry = SchemaRegistry::from_json_str(raw).unwrap();
        let usage = registry.schema_for(Category::Usage).unwrap();
        assert!(usage.optional().is_empty());
        assert_eq!(usage.all_columns().collect::<Vec<_>>(), vec!["CustomerID"]);
    }

    #[test]
    fn test_missing_category_in_custom_registry() {
        let schema =
            StandardSchema::new(vec!["invoice_id".to_string()], vec!["due_date".to_string()])
                .unwrap();
        let registry = SchemaRegistry::from_schemas([(Category::Billing, schema)]);
        assert!(registry.schema_for(Category::Billing).is_ok());
        assert!(registry.schema_for(Category::Support).is_err());
    }
}
