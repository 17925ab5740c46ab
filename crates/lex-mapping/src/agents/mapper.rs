//! Column mapping between a dataset and a category's standard schema.

use super::{AdvisoryAgent, VALIDATION_REPLY_FORMAT, format_columns};
use crate::ai::{AIProvider, CompletionOptions, CompletionRequest};
use crate::error::{MappingError, Result};
use crate::parser::parse_mapping;
use crate::progress::MappingStage;
use crate::schema::{SchemaRegistry, StandardSchema};
use crate::types::{Category, ColumnMapping, MappingStats};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a data mapper. You match the columns of an uploaded \
dataset to a fixed set of standard column names.";

/// Input columns of a dataset and the category to map them against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTask {
    pub input_columns: Vec<String>,
    pub category: Category,
}

impl MappingTask {
    pub fn new(input_columns: Vec<String>, category: Category) -> Self {
        Self {
            input_columns,
            category,
        }
    }
}

/// Asks an [`AIProvider`] to map input columns to standard columns.
pub struct ColumnMapper {
    provider: Arc<dyn AIProvider>,
    registry: Arc<SchemaRegistry>,
    options: CompletionOptions,
}

impl ColumnMapper {
    pub fn new(
        provider: Arc<dyn AIProvider>,
        registry: Arc<SchemaRegistry>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            provider,
            registry,
            options,
        }
    }

    /// Registry the mapper validates against.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Suggest a `standard -> input` mapping for `category`.
    ///
    /// # Errors
    ///
    /// [`MappingError::InvalidCategory`] when no standard schema exists for
    /// the category, [`MappingError::AiClientError`] when the call fails.
    /// Unusable replies are not errors; they produce an empty mapping.
    pub fn map_columns(&self, input_columns: &[String], category: Category) -> Result<ColumnMapping> {
        let schema = self.schema(category)?;

        let request = CompletionRequest::new(
            SYSTEM_PROMPT,
            build_user_prompt(input_columns, schema, category),
            self.options.clone(),
        );

        let reply = self
            .provider
            .invoke(&request)
            .map_err(MappingError::ai_client)?;
        debug!("Mapper reply: {} chars", reply.len());

        let standard: Vec<&str> = schema.all_columns().collect();
        let mapping = parse_mapping(&reply, &standard, input_columns);
        info!(
            "Mapped {} of {} standard columns for '{}'",
            mapping.assigned().count(),
            schema.len(),
            category
        );
        Ok(mapping)
    }

    fn schema(&self, category: Category) -> Result<&StandardSchema> {
        self.registry
            .schema_for(category)
            .map_err(|_| MappingError::InvalidCategory(category.to_string()))
    }
}

fn build_user_prompt(input_columns: &[String], schema: &StandardSchema, category: Category) -> String {
    format!(
        r#"The dataset belongs to the '{}' category.

Input columns:
{}

Mandatory standard columns:
{}

Optional standard columns:
{}

Map each standard column to the input column that holds the same information.
Use every input column at most once. Use null when no input column fits.
Return only a JSON object whose keys are standard column names and whose values are input column names or null, for example:
{{"CustomerID": "cust_id", "DueDate": null}}"#,
        category,
        format_columns(input_columns),
        format_columns(schema.mandatory()),
        format_columns(schema.optional())
    )
}

/// Coverage of `schema` by `mapping` over the given input columns.
///
/// Entries whose standard column is not part of the schema are ignored.
pub fn mapping_stats(
    mapping: &ColumnMapping,
    input_columns: &[String],
    schema: &StandardSchema,
) -> MappingStats {
    let inputs: HashSet<&str> = input_columns.iter().map(String::as_str).collect();
    let assigned: Vec<(&str, &str)> = mapping
        .assigned()
        .filter(|(standard, _)| schema.contains(standard))
        .collect();

    let mapped_inputs: HashSet<&str> = assigned
        .iter()
        .map(|(_, input)| *input)
        .filter(|input| inputs.contains(input))
        .collect();
    let mapped_mandatory = assigned
        .iter()
        .filter(|(standard, _)| schema.is_mandatory(standard))
        .count();
    let mapped_optional = assigned.len() - mapped_mandatory;

    MappingStats {
        total_input_columns: inputs.len(),
        total_mandatory_columns: schema.mandatory().len(),
        total_optional_columns: schema.optional().len(),
        mapped_input_columns: mapped_inputs.len(),
        mapped_mandatory_columns: mapped_mandatory,
        mapped_optional_columns: mapped_optional,
        unmapped_mandatory_columns: schema.mandatory().len() - mapped_mandatory,
        unmapped_optional_columns: schema.optional().len() - mapped_optional,
    }
}

impl AdvisoryAgent for ColumnMapper {
    type Task = MappingTask;
    type Output = ColumnMapping;

    fn name(&self) -> &str {
        "Column Mapping"
    }

    fn stage(&self) -> MappingStage {
        MappingStage::Mapping
    }

    fn produce(&self, task: &MappingTask) -> Result<ColumnMapping> {
        self.map_columns(&task.input_columns, task.category)
    }

    fn build_validation_request(
        &self,
        output: &ColumnMapping,
        task: &MappingTask,
        options: &CompletionOptions,
    ) -> Result<CompletionRequest> {
        let schema = self.schema(task.category)?;
        let user_prompt = format!(
            r#"Input columns:
{}

Mandatory standard columns:
{}

Optional standard columns:
{}

Proposed mapping (standard column -> input column):
{}

Check that every mapped input column exists, that no input column is used twice, and that each pair describes the same information. Missing optional columns are acceptable.
{}"#,
            format_columns(&task.input_columns),
            format_columns(schema.mandatory()),
            format_columns(schema.optional()),
            serde_json::to_string_pretty(output)?,
            VALIDATION_REPLY_FORMAT
        );

        Ok(CompletionRequest::new(
            "You review the work of a data mapper.",
            user_prompt,
            options.clone(),
        ))
    }
}
