//! Reconciliation of suggested and user-edited column mappings.
//!
//! [`MappingReconciler`] owns the single authoritative mapping of one
//! session. It is seeded from an AI suggestion (or blank, for manual mode),
//! edited one standard column at a time, and finally frozen into a
//! [`ConfirmedMapping`].
//!
//! After every successful edit the mapping is injective (no input column is
//! used by two standard columns) and its keys are exactly the schema's
//! standard columns.

use crate::error::{MappingError, Result};
use crate::schema::StandardSchema;
use crate::types::{Category, ColumnMapping};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Initial content of a reconciler.
#[derive(Debug, Clone, Copy)]
pub enum Seed<'a> {
    /// Start from a suggested mapping; missing keys start unset.
    AiSuggestion(&'a ColumnMapping),
    /// Start with every standard column unset.
    Manual,
}

/// A mapping accepted by the user, ready to be applied to the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedMapping {
    pub category: Category,
    pub mapping: ColumnMapping,
    pub confirmed_at: DateTime<Utc>,
}

impl ConfirmedMapping {
    /// `input -> standard` pairs used to rename dataset columns.
    pub fn rename_pairs(&self) -> BTreeMap<String, String> {
        self.mapping.to_rename_map()
    }
}

/// Editable mapping over one schema and one dataset.
#[derive(Debug, Clone)]
pub struct MappingReconciler {
    category: Category,
    schema: StandardSchema,
    input_columns: Vec<String>,
    mapping: ColumnMapping,
    confirmed: bool,
}

impl MappingReconciler {
    /// Create a reconciler with every standard column unset.
    pub fn new(category: Category, schema: StandardSchema, input_columns: Vec<String>) -> Self {
        let mapping = blank_mapping(&schema);
        Self {
            category,
            schema,
            input_columns,
            mapping,
            confirmed: false,
        }
    }

    /// Replace the current mapping with `seed`.
    ///
    /// Suggested entries are taken in schema order (mandatory first). An
    /// entry is dropped when its input column is not in the dataset or is
    /// already used by an earlier standard column. Keys outside the schema
    /// are ignored.
    pub fn seed(&mut self, seed: Seed<'_>) -> Result<()> {
        self.ensure_editable()?;
        let mut mapping = blank_mapping(&self.schema);

        if let Seed::AiSuggestion(suggestion) = seed {
            let mut used = HashSet::new();
            for standard in self.schema.all_columns() {
                let Some(input) = suggestion.get(standard) else {
                    continue;
                };
                if !self.has_input(input) {
                    warn!("Dropping suggestion {} -> {}: unknown input column", standard, input);
                    continue;
                }
                if !used.insert(input) {
                    warn!(
                        "Dropping suggestion {} -> {}: input column already mapped",
                        standard, input
                    );
                    continue;
                }
                mapping.insert(standard, Some(input.to_string()));
            }
            for (standard, _) in suggestion.iter() {
                if !self.schema.contains(standard) {
                    debug!("Ignoring suggestion for unknown standard column {}", standard);
                }
            }
        }

        self.mapping = mapping;
        debug!(
            "Seeded {} of {} standard columns",
            self.mapping.assigned().count(),
            self.schema.len()
        );
        Ok(())
    }

    /// Input columns not assigned to any standard column, in dataset order.
    pub fn propose_available_inputs(&self) -> Vec<&str> {
        self.input_columns
            .iter()
            .map(String::as_str)
            .filter(|input| self.mapping.standard_for_input(input).is_none())
            .collect()
    }

    /// Choices for `standard`: its current input column first, then the
    /// available pool.
    pub fn options_for(&self, standard: &str) -> Result<Vec<&str>> {
        if !self.schema.contains(standard) {
            return Err(MappingError::UnknownStandardColumn(standard.to_string()));
        }
        let mut options: Vec<&str> = self.mapping.get(standard).into_iter().collect();
        options.extend(self.propose_available_inputs());
        Ok(options)
    }

    /// Assign `input` to `standard`, or unset it with `None`.
    ///
    /// Reassigning a standard column to the input it already holds is
    /// allowed. On error the mapping is left unchanged.
    pub fn set(&mut self, standard: &str, input: Option<&str>) -> Result<()> {
        self.ensure_editable()?;
        if !self.schema.contains(standard) {
            return Err(MappingError::UnknownStandardColumn(standard.to_string()));
        }

        if let Some(input) = input {
            if !self.has_input(input) {
                return Err(MappingError::UnknownInputColumn(input.to_string()));
            }
            if let Some(holder) = self.mapping.standard_for_input(input)
                && holder != standard
            {
                return Err(MappingError::InputColumnAlreadyMapped {
                    input: input.to_string(),
                    standard: holder.to_string(),
                });
            }
        }

        debug!("Set {} -> {:?}", standard, input);
        self.mapping.insert(standard, input.map(str::to_string));
        Ok(())
    }

    /// Mandatory standard columns that are currently unset.
    pub fn unmapped_mandatory(&self) -> Vec<&str> {
        self.schema
            .mandatory()
            .iter()
            .map(String::as_str)
            .filter(|standard| self.mapping.get(standard).is_none())
            .collect()
    }

    /// Freeze the mapping.
    ///
    /// # Errors
    ///
    /// [`MappingError::MandatoryColumnsUnmapped`] lists every unset mandatory
    /// column; [`MappingError::MappingAlreadyConfirmed`] on a second call.
    pub fn confirm(&mut self) -> Result<ConfirmedMapping> {
        self.ensure_editable()?;
        let missing = self.unmapped_mandatory();
        if !missing.is_empty() {
            return Err(MappingError::MandatoryColumnsUnmapped(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        self.confirmed = true;
        info!(
            "Confirmed {} mapping with {} assigned columns",
            self.category,
            self.mapping.assigned().count()
        );
        Ok(ConfirmedMapping {
            category: self.category,
            mapping: self.mapping.clone(),
            confirmed_at: Utc::now(),
        })
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn schema(&self) -> &StandardSchema {
        &self.schema
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    fn has_input(&self, input: &str) -> bool {
        self.input_columns.iter().any(|c| c == input)
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.confirmed {
            return Err(MappingError::MappingAlreadyConfirmed);
        }
        Ok(())
    }
}

fn blank_mapping(schema: &StandardSchema) -> ColumnMapping {
    schema
        .all_columns()
        .map(|standard| (standard.to_string(), None))
        .collect()
}
