//! Validate-and-retry orchestration of advisory agents.
//!
//! Each attempt makes at most two advisory calls: one to produce a
//! candidate, one to validate it. The loop stops at the first valid
//! candidate or after `max_retries + 1` attempts, so it always terminates
//! with at most `2 * (max_retries + 1)` calls.
//!
//! Failures at the advisory boundary never abort the loop. A failed
//! production call yields the agent's default candidate; a failed
//! validation call counts as an invalid verdict.

use crate::agents::AdvisoryAgent;
use crate::ai::{AIProvider, CompletionOptions};
use crate::config::RetryPolicy;
use crate::error::{MappingError, Result};
use crate::parser::parse_validation;
use crate::progress::{CancellationToken, MappingStage, ProgressReporter, ProgressUpdate};
use crate::types::ValidationOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the retry loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStatus {
    /// A candidate passed validation.
    Accepted,
    /// Every attempt was used; the last candidate is returned unvalidated.
    Exhausted,
}

/// Final candidate of a retry loop with its validation verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryOutcome<T> {
    pub result: T,
    /// Diagnostic message of the last validation pass.
    pub message: String,
    pub is_valid: bool,
    /// Number of attempts made, at least 1.
    pub attempts: u32,
    pub status: RetryStatus,
}

impl<T> RetryOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        self.status == RetryStatus::Accepted
    }
}

/// Runs an [`AdvisoryAgent`] until a validator accepts its answer.
///
/// # Example
///
/// ```rust,ignore
/// use lex_mapping::{ValidateAndRetry, RetryPolicy, CategoryClassifier, ClassificationTask};
///
/// let orchestrator = ValidateAndRetry::new(provider.clone(), RetryPolicy::default(), options);
/// let outcome = orchestrator.run(&classifier, &ClassificationTask::new(columns))?;
/// if !outcome.is_valid {
///     println!("Best effort: {} ({})", outcome.result, outcome.message);
/// }
/// ```
pub struct ValidateAndRetry {
    validator: Arc<dyn AIProvider>,
    policy: RetryPolicy,
    options: CompletionOptions,
    cancellation: CancellationToken,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl ValidateAndRetry {
    /// Create an orchestrator that validates with `validator` using `options`.
    pub fn new(validator: Arc<dyn AIProvider>, policy: RetryPolicy, options: CompletionOptions) -> Self {
        Self {
            validator,
            policy,
            options,
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }

    /// Use `token` to abandon the loop between attempts.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Send progress updates to `reporter`.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `agent` on `task` until its answer is validated or attempts run out.
    ///
    /// # Errors
    ///
    /// [`MappingError::Cancelled`] if the token was cancelled before an
    /// attempt started. Errors that are not advisory failures (for example
    /// [`MappingError::InvalidCategory`]) are returned as-is.
    pub fn run<A: AdvisoryAgent>(&self, agent: &A, task: &A::Task) -> Result<RetryOutcome<A::Output>> {
        let total_attempts = self.policy.total_attempts();
        let mut attempt: u32 = 0;

        loop {
            let number = attempt.saturating_add(1);
            if self.cancellation.is_cancelled() {
                info!("{} cancelled before attempt {}", agent.name(), number);
                self.report(ProgressUpdate::cancelled());
                return Err(MappingError::Cancelled);
            }

            self.report(ProgressUpdate::for_attempt(
                agent.stage(),
                attempt,
                format!("{}: attempt {} of {}", agent.name(), number, total_attempts),
            ));

            let result = match agent.produce(task) {
                Ok(result) => result,
                Err(e) if e.is_advisory_failure() => {
                    warn!("{} attempt {} failed: {}", agent.name(), number, e);
                    A::Output::default()
                }
                Err(e) => return Err(e),
            };

            self.report(ProgressUpdate::for_attempt(
                MappingStage::Validating,
                attempt,
                format!("Validating {} result", agent.name()),
            ));
            let outcome = self.validate(agent, &result, task)?;
            debug!(
                "{} attempt {} verdict: valid={} ({})",
                agent.name(),
                number,
                outcome.is_valid,
                outcome.diagnostic_message
            );

            if outcome.is_valid {
                info!("{} accepted after {} attempt(s)", agent.name(), number);
                self.report(ProgressUpdate::complete(format!("{} validated", agent.name())));
                return Ok(RetryOutcome {
                    result,
                    message: outcome.diagnostic_message,
                    is_valid: true,
                    attempts: number,
                    status: RetryStatus::Accepted,
                });
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    "{} not validated after {} attempt(s): {}",
                    agent.name(),
                    number,
                    outcome.diagnostic_message
                );
                self.report(ProgressUpdate::complete(format!(
                    "{} not validated, using last result",
                    agent.name()
                )));
                return Ok(RetryOutcome {
                    result,
                    message: outcome.diagnostic_message,
                    is_valid: false,
                    attempts: number,
                    status: RetryStatus::Exhausted,
                });
            }

            self.report(ProgressUpdate::for_attempt(
                MappingStage::Retrying,
                attempt,
                outcome.diagnostic_message.clone(),
            ));
            if !self.policy.retry_delay.is_zero() {
                std::thread::sleep(self.policy.retry_delay);
            }
            attempt += 1;
        }
    }

    fn validate<A: AdvisoryAgent>(
        &self,
        agent: &A,
        result: &A::Output,
        task: &A::Task,
    ) -> Result<ValidationOutcome> {
        let request = match agent.build_validation_request(result, task, &self.options) {
            Ok(request) => request,
            Err(e) if e.is_advisory_failure() => {
                return Ok(ValidationOutcome::invalid(format!(
                    "Could not build validation request: {e}"
                )));
            }
            Err(e) => return Err(e),
        };

        match self.validator.invoke(&request) {
            Ok(reply) => Ok(parse_validation(&reply)),
            Err(e) => {
                let e = MappingError::ai_client(e);
                warn!("Validation call via {} failed: {}", self.validator.name(), e);
                Ok(ValidationOutcome::invalid(format!("Validation call failed: {e}")))
            }
        }
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress {
            reporter.report(update);
        }
    }
}

static_assertions::assert_impl_all!(ValidateAndRetry: Send, Sync);
