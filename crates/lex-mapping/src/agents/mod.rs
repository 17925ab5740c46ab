//! Advisory agents: category classification and column mapping.
//!
//! Each agent turns a task into a candidate answer with one call to an
//! [`AIProvider`](crate::ai::AIProvider), and knows how to phrase the prompt
//! that asks a validator whether that candidate is acceptable. The
//! [`ValidateAndRetry`](crate::retry::ValidateAndRetry) orchestrator drives
//! both halves.

mod classifier;
mod mapper;

pub use classifier::{CategoryClassifier, ClassificationTask};
pub use mapper::{ColumnMapper, MappingTask, mapping_stats};

use crate::ai::{CompletionOptions, CompletionRequest};
use crate::error::Result;
use crate::progress::MappingStage;

/// An agent whose answers can be checked by a second advisory call.
///
/// `Output::default()` is the "nothing found" candidate used when producing
/// fails at the advisory boundary.
pub trait AdvisoryAgent: Send + Sync {
    /// What the agent works on.
    type Task;

    /// What the agent answers with.
    type Output: Default + Clone;

    /// Agent name for logging.
    fn name(&self) -> &str;

    /// Stage reported while this agent is producing.
    fn stage(&self) -> MappingStage;

    /// Produce a candidate answer for `task`.
    fn produce(&self, task: &Self::Task) -> Result<Self::Output>;

    /// Build the request asking whether `output` is an acceptable answer.
    fn build_validation_request(
        &self,
        output: &Self::Output,
        task: &Self::Task,
        options: &CompletionOptions,
    ) -> Result<CompletionRequest>;
}

/// Render column names as a quoted, comma separated list for prompts.
pub(crate) fn format_columns<S: AsRef<str>>(columns: &[S]) -> String {
    if columns.is_empty() {
        return "(none)".to_string();
    }
    columns
        .iter()
        .map(|c| format!("\"{}\"", c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shared instruction for every validation prompt. Keeps the reply shape
/// that [`parse_validation`](crate::parser::parse_validation) understands.
pub(crate) const VALIDATION_REPLY_FORMAT: &str = "Respond with TRUE or FALSE on the first line. \
On the second line give a short reason. If FALSE, say what should be fixed.";


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_columns() {
        assert_eq!(format_columns(&["a", "b"]), "\"a\", \"b\"");
        assert_eq!(format_columns::<&str>(&[]), "(none)");
    }
}
