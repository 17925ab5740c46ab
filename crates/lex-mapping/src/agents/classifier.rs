//! Category identification from column names.

use super::{AdvisoryAgent, VALIDATION_REPLY_FORMAT, format_columns};
use crate::ai::{AIProvider, CompletionOptions, CompletionRequest};
use crate::error::{MappingError, Result};
use crate::parser::parse_category;
use crate::progress::MappingStage;
use crate::types::Category;
use std::sync::Arc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a data categorizer. You look at the column names of a \
dataset and decide which kind of business data it holds.";

/// Column names of the dataset to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationTask {
    pub columns: Vec<String>,
}

impl ClassificationTask {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

/// Asks an [`AIProvider`] which [`Category`] a dataset belongs to.
///
/// A single call per [`classify`](Self::classify); retries belong to the
/// orchestrator.
pub struct CategoryClassifier {
    provider: Arc<dyn AIProvider>,
    options: CompletionOptions,
}

impl CategoryClassifier {
    pub fn new(provider: Arc<dyn AIProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    /// Classify a dataset from its column names.
    ///
    /// Replies that mention none of the known categories yield
    /// [`Category::NoneOfThese`]. Transport failures are returned as
    /// [`MappingError::AiClientError`].
    pub fn classify(&self, columns: &[String]) -> Result<Category> {
        let request = CompletionRequest::new(
            SYSTEM_PROMPT,
            build_user_prompt(columns),
            self.options.clone(),
        );

        let reply = self
            .provider
            .invoke(&request)
            .map_err(MappingError::ai_client)?;
        debug!("Classifier reply: {:?}", reply.trim());

        let category = parse_category(&reply);
        info!(
            "Identified category '{}' from {} columns via {}",
            category,
            columns.len(),
            self.provider.name()
        );
        Ok(category)
    }
}

fn build_user_prompt(columns: &[String]) -> String {
    let categories = Category::RECOGNIZED
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"The dataset has the following columns:
{}

Which of these categories describes the dataset best: {}?
- billing: invoices, payments, revenue, charges
- usage: product or feature usage, consumption, activity
- support: tickets, cases, customer service interactions
- other: anything that is none of the above

Answer with the category name only."#,
        format_columns(columns),
        categories
    )
}

impl AdvisoryAgent for CategoryClassifier {
    type Task = ClassificationTask;
    type Output = Category;

    fn name(&self) -> &str {
        "Category Identification"
    }

    fn stage(&self) -> MappingStage {
        MappingStage::Classifying
    }

    fn produce(&self, task: &ClassificationTask) -> Result<Category> {
        self.classify(&task.columns)
    }

    fn build_validation_request(
        &self,
        output: &Category,
        task: &ClassificationTask,
        options: &CompletionOptions,
    ) -> Result<CompletionRequest> {
        let user_prompt = format!(
            r#"A dataset with the columns
{}
was classified as '{}'.

Is this classification correct? The allowed categories are billing, usage, support and other; '{}' means classification failed.
{}"#,
            format_columns(&task.columns),
            output,
            Category::NoneOfThese,
            VALIDATION_REPLY_FORMAT
        );

        Ok(CompletionRequest::new(
            "You review the work of a data categorizer.",
            user_prompt,
            options.clone(),
        ))
    }
}
