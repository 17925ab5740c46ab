//! One dataset's walk from upload to confirmed mapping.
//!
//! The steps follow the interactive flow: identify the category, confirm it
//! (or pick another), get a suggested mapping or start from scratch, edit,
//! confirm. All step state lives in the [`MappingSession`] value.

use crate::agents::{
    CategoryClassifier, ClassificationTask, ColumnMapper, MappingTask, mapping_stats,
};
use crate::ai::AIProvider;
use crate::config::MappingConfig;
use crate::error::{MappingError, Result};
use crate::progress::{CancellationToken, ProgressReporter};
use crate::reconcile::{ConfirmedMapping, MappingReconciler, Seed};
use crate::retry::{RetryOutcome, ValidateAndRetry};
use crate::schema::SchemaRegistry;
use crate::types::{Category, ColumnMapping, MappingStats};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot of a session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub suggested_category: Option<Category>,
    pub category_validated: Option<bool>,
    pub category: Option<Category>,
    /// Standard columns the suggestion assigned ("AI suggested N of M").
    pub suggested_columns: Option<usize>,
    pub total_standard_columns: Option<usize>,
    pub mapping_validated: Option<bool>,
    pub validation_message: Option<String>,
    pub stats: Option<MappingStats>,
    pub unmapped_mandatory: Vec<String>,
    pub mapping_confirmed: bool,
}

/// State machine for one dataset.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = MappingSession::new(provider, registry, &config, columns);
/// session.identify_category()?;
/// session.confirm_category(None)?;
/// session.suggest_mapping()?;
/// session.reconciler_mut().unwrap().set("DueDate", Some("due"))?;
/// let confirmed = session.confirm_mapping()?;
/// ```
pub struct MappingSession {
    registry: Arc<SchemaRegistry>,
    classifier: CategoryClassifier,
    mapper: ColumnMapper,
    orchestrator: ValidateAndRetry,
    input_columns: Vec<String>,
    category_outcome: Option<RetryOutcome<Category>>,
    category: Option<Category>,
    mapping_outcome: Option<RetryOutcome<ColumnMapping>>,
    reconciler: Option<MappingReconciler>,
    confirmed: Option<ConfirmedMapping>,
}

static_assertions::assert_impl_all!(MappingSession: Send);

impl MappingSession {
    /// Create a session using `provider` for every advisory call.
    pub fn new(
        provider: Arc<dyn AIProvider>,
        registry: Arc<SchemaRegistry>,
        config: &MappingConfig,
        input_columns: Vec<String>,
    ) -> Self {
        Self {
            classifier: CategoryClassifier::new(provider.clone(), config.classifier.clone()),
            mapper: ColumnMapper::new(provider.clone(), registry.clone(), config.mapper.clone()),
            orchestrator: ValidateAndRetry::new(provider, config.retry, config.validator.clone()),
            registry,
            input_columns,
            category_outcome: None,
            category: None,
            mapping_outcome: None,
            reconciler: None,
            confirmed: None,
        }
    }

    /// Use `token` to abandon advisory loops between attempts.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.orchestrator = self.orchestrator.cancellation_token(token);
        self
    }

    /// Send progress of advisory loops to `reporter`.
    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.orchestrator = self.orchestrator.progress_reporter(reporter);
        self
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    /// Ask for a category with validation and retries.
    ///
    /// The outcome is stored as the suggestion; it is not confirmed.
    pub fn identify_category(&mut self) -> Result<&RetryOutcome<Category>> {
        let task = ClassificationTask::new(self.input_columns.clone());
        let outcome = self.orchestrator.run(&self.classifier, &task)?;
        if !outcome.is_valid {
            warn!("Category suggestion was not validated: {}", outcome.message);
        }
        Ok(self.category_outcome.insert(outcome))
    }

    /// The stored category suggestion, if any.
    pub fn category_suggestion(&self) -> Option<&RetryOutcome<Category>> {
        self.category_outcome.as_ref()
    }

    /// Confirm the suggested category, or `choice` instead.
    ///
    /// Changing the category discards any mapping in progress.
    ///
    /// # Errors
    ///
    /// [`MappingError::CategoryNotConfirmed`] with no choice and no
    /// suggestion; [`MappingError::UnknownCategory`] when the category has
    /// no standard schema (always the case for `none-of-these`);
    /// [`MappingError::MappingAlreadyConfirmed`] once the mapping is confirmed.
    pub fn confirm_category(&mut self, choice: Option<Category>) -> Result<Category> {
        self.ensure_not_confirmed()?;
        let category = choice
            .or_else(|| self.category_outcome.as_ref().map(|o| o.result))
            .ok_or(MappingError::CategoryNotConfirmed)?;
        self.registry.schema_for(category)?;

        if self.category != Some(category) {
            self.clear_mapping();
        }
        self.category = Some(category);
        info!("Category confirmed: {}", category);
        Ok(category)
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// Ask for a mapping with validation and retries, then seed the
    /// reconciler from it. The reconciler is seeded even when the suggestion
    /// was not validated.
    pub fn suggest_mapping(&mut self) -> Result<&RetryOutcome<ColumnMapping>> {
        self.ensure_not_confirmed()?;
        let category = self.category.ok_or(MappingError::CategoryNotConfirmed)?;
        let task = MappingTask::new(self.input_columns.clone(), category);
        let outcome = self.orchestrator.run(&self.mapper, &task)?;

        let mut reconciler = self.new_reconciler(category)?;
        reconciler.seed(Seed::AiSuggestion(&outcome.result))?;
        self.reconciler = Some(reconciler);

        Ok(self.mapping_outcome.insert(outcome))
    }

    /// Start editing with every standard column unset.
    pub fn start_manual_mapping(&mut self) -> Result<&mut MappingReconciler> {
        self.ensure_not_confirmed()?;
        let category = self.category.ok_or(MappingError::CategoryNotConfirmed)?;
        let mut reconciler = self.new_reconciler(category)?;
        reconciler.seed(Seed::Manual)?;
        self.mapping_outcome = None;
        Ok(self.reconciler.insert(reconciler))
    }

    /// The stored mapping suggestion, if any.
    pub fn mapping_suggestion(&self) -> Option<&RetryOutcome<ColumnMapping>> {
        self.mapping_outcome.as_ref()
    }

    pub fn reconciler(&self) -> Option<&MappingReconciler> {
        self.reconciler.as_ref()
    }

    pub fn reconciler_mut(&mut self) -> Option<&mut MappingReconciler> {
        self.reconciler.as_mut()
    }

    /// Confirm the mapping being edited.
    ///
    /// Without a suggestion or manual start, confirmation fails listing
    /// every mandatory column of the confirmed category.
    pub fn confirm_mapping(&mut self) -> Result<&ConfirmedMapping> {
        let category = self.category.ok_or(MappingError::CategoryNotConfirmed)?;
        let reconciler = match self.reconciler.take() {
            Some(reconciler) => reconciler,
            None => self.new_reconciler(category)?,
        };

        let confirmed = self.reconciler.insert(reconciler).confirm()?;
        Ok(self.confirmed.insert(confirmed))
    }

    pub fn confirmed_mapping(&self) -> Option<&ConfirmedMapping> {
        self.confirmed.as_ref()
    }

    /// Snapshot for display.
    pub fn summary(&self) -> SessionSummary {
        let schema = self
            .category
            .and_then(|category| self.registry.schema_for(category).ok());

        SessionSummary {
            suggested_category: self.category_outcome.as_ref().map(|o| o.result),
            category_validated: self.category_outcome.as_ref().map(|o| o.is_valid),
            category: self.category,
            suggested_columns: self
                .mapping_outcome
                .as_ref()
                .map(|o| o.result.assigned().count()),
            total_standard_columns: schema.map(|s| s.len()),
            mapping_validated: self.mapping_outcome.as_ref().map(|o| o.is_valid),
            validation_message: self.mapping_outcome.as_ref().map(|o| o.message.clone()),
            stats: self.reconciler.as_ref().map(|r| {
                mapping_stats(r.mapping(), &self.input_columns, r.schema())
            }),
            unmapped_mandatory: self
                .reconciler
                .as_ref()
                .map(|r| r.unmapped_mandatory().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            mapping_confirmed: self.confirmed.is_some(),
        }
    }

    /// Forget every step and start over with the same dataset.
    pub fn reset(&mut self) {
        self.category_outcome = None;
        self.category = None;
        self.clear_mapping();
    }

    /// A confirmed mapping is final until [`reset`](Self::reset).
    fn ensure_not_confirmed(&self) -> Result<()> {
        if self.confirmed.is_some() {
            return Err(MappingError::MappingAlreadyConfirmed);
        }
        Ok(())
    }

    fn clear_mapping(&mut self) {
        self.mapping_outcome = None;
        self.reconciler = None;
        self.confirmed = None;
    }

    fn new_reconciler(&self, category: Category) -> Result<MappingReconciler> {
        let schema = self.registry.schema_for(category)?.clone();
        Ok(MappingReconciler::new(
            category,
            schema,
            self.input_columns.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use crate::config::RetryPolicy;
    use std::time::Duration;

    fn config() -> MappingConfig {
        MappingConfig::builder()
            .retry(RetryPolicy::new(1, Duration::ZERO))
            .build()
            .unwrap()
    }

    fn session(provider: &Arc<ScriptedProvider>) -> MappingSession {
        MappingSession::new(
            provider.clone(),
            Arc::new(SchemaRegistry::builtin().unwrap()),
            &config(),
            vec![
                "cust_id".to_string(),
                "bill_date".to_string(),
                "amount".to_string(),
                "due".to_string(),
            ],
        )
    }

    #[test]
    fn test_full_flow_with_validated_suggestions() {
        let provider = Arc::new(ScriptedProvider::new([
            "billing",
            "TRUE\nok",
            r#"{"CustomerID": "cust_id", "BillingDate": "bill_date", "Revenue": "amount"}"#,
            "TRUE\nok",
        ]));
        let mut session = session(&provider);

        assert_eq!(session.identify_category().unwrap().result, Category::Billing);
        assert_eq!(session.confirm_category(None).unwrap(), Category::Billing);
        assert!(session.suggest_mapping().unwrap().is_valid);

        let summary = session.summary();
        assert_eq!(summary.suggested_columns, Some(3));
        assert_eq!(summary.total_standard_columns, Some(10));
        assert!(summary.unmapped_mandatory.is_empty());

        session
            .reconciler_mut()
            .unwrap()
            .set("DueDate", Some("due"))
            .unwrap();
        let confirmed = session.confirm_mapping().unwrap();
        assert_eq!(confirmed.mapping.get("DueDate"), Some("due"));
        assert!(session.summary().mapping_confirmed);
    }

    #[test]
    fn test_none_of_these_cannot_be_confirmed() {
        let provider = Arc::new(ScriptedProvider::new([
            "no idea", "FALSE", "still no idea", "FALSE",
        ]));
        let mut session = session(&provider);

        let outcome = session.identify_category().unwrap();
        assert_eq!(outcome.result, Category::NoneOfThese);
        assert!(!outcome.is_valid);

        assert!(matches!(
            session.confirm_category(None).unwrap_err(),
            MappingError::UnknownCategory(_)
        ));
        assert_eq!(session.confirm_category(Some(Category::Usage)).unwrap(), Category::Usage);
    }

    #[test]
    fn test_steps_require_confirmed_category() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let mut session = session(&provider);

        assert!(matches!(
            session.confirm_category(None).unwrap_err(),
            MappingError::CategoryNotConfirmed
        ));
        assert!(matches!(
            session.suggest_mapping().unwrap_err(),
            MappingError::CategoryNotConfirmed
        ));
        assert!(session.start_manual_mapping().is_err());
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_manual_mapping_and_confirm_gate() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let mut session = session(&provider);
        session.confirm_category(Some(Category::Billing)).unwrap();

        let reconciler = session.start_manual_mapping().unwrap();
        reconciler.set("CustomerID", Some("cust_id")).unwrap();

        match session.confirm_mapping().unwrap_err() {
            MappingError::MandatoryColumnsUnmapped(missing) => {
                assert_eq!(missing, vec!["BillingDate".to_string(), "Revenue".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_changing_category_discards_mapping() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let mut session = session(&provider);
        session.confirm_category(Some(Category::Billing)).unwrap();
        session.start_manual_mapping().unwrap();

        session.confirm_category(Some(Category::Billing)).unwrap();
        assert!(session.reconciler().is_some());

        session.confirm_category(Some(Category::Support)).unwrap();
        assert!(session.reconciler().is_none());
    }

    #[test]
    fn test_confirmed_mapping_cannot_be_reopened() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let mut session = session(&provider);
        session.confirm_category(Some(Category::Billing)).unwrap();
        let reconciler = session.start_manual_mapping().unwrap();
        reconciler.set("CustomerID", Some("cust_id")).unwrap();
        reconciler.set("BillingDate", Some("bill_date")).unwrap();
        reconciler.set("Revenue", Some("amount")).unwrap();
        session.confirm_mapping().unwrap();

        assert!(matches!(
            session.start_manual_mapping().unwrap_err(),
            MappingError::MappingAlreadyConfirmed
        ));
        assert!(matches!(
            session.suggest_mapping().unwrap_err(),
            MappingError::MappingAlreadyConfirmed
        ));
        assert!(matches!(
            session.confirm_category(Some(Category::Support)).unwrap_err(),
            MappingError::MappingAlreadyConfirmed
        ));
        assert_eq!(session.category(), Some(Category::Billing));
        assert_eq!(
            session.confirmed_mapping().unwrap().mapping.get("Revenue"),
            Some("amount")
        );
        assert_eq!(provider.call_count(), 0);

        session.reset();
        assert!(session.confirmed_mapping().is_none());
        assert!(session.confirm_category(Some(Category::Support)).is_ok());
    }

    #[test]
    fn test_reset() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let mut session = session(&provider);
        session.confirm_category(Some(Category::Other)).unwrap();
        session.start_manual_mapping().unwrap();

        session.reset();
        assert!(session.category().is_none());
        assert!(session.reconciler().is_none());
        assert!(session.category_suggestion().is_none());
    }
}
