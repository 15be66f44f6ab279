use chrono::Local;
use ledgerlens_core::{Credentials, ReceiptDraft, RetryConfig, RetryPolicy, ReviewedFields, SubmissionOutcome};
use std::time::Duration;

use crate::transaction::{TransactionError, TransactionSink};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(3);

/// Drives a draft into the ledger with bounded retries and exponential backoff.
///
/// Every attempt resubmits the identical payload. The ledger is not idempotent,
/// so an attempt that times out after the ledger committed can leave a
/// duplicate behind unless the client's duplicate guard is on.
pub struct Submitter<S: TransactionSink> {
    sink: S,
    max_attempts: u32,
    base_delay: Duration,
    policy: RetryPolicy,
}

impl<S: TransactionSink> Submitter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            policy: RetryPolicy::Uniform,
        }
    }

    pub fn from_config(sink: S, config: &RetryConfig) -> Self {
        Self::new(sink)
            .with_max_attempts(config.max_attempts)
            .with_base_delay(config.base_delay())
            .with_policy(config.policy)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Wait before the retry that follows attempt `attempt_index` (0-based):
    /// `base_delay * 2^attempt_index`.
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt_index))
    }

    /// Validate reviewed form values, then submit. Invalid data is reported
    /// without contacting the ledger.
    pub async fn submit_reviewed(
        &self,
        fields: ReviewedFields,
        source_account: &str,
        credentials: &Credentials,
    ) -> SubmissionOutcome {
        match fields.into_draft(Local::now().date_naive()) {
            Ok(draft) => self.submit(&draft, source_account, credentials).await,
            Err(e) => {
                tracing::warn!(error = %e, "Reviewed receipt failed validation");
                SubmissionOutcome::Failure {
                    message: format!("Failed to create transaction: invalid data: {e}"),
                    attempts_made: 0,
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(store = %draft.store_name, source = source_account))]
    pub async fn submit(
        &self,
        draft: &ReceiptDraft,
        source_account: &str,
        credentials: &Credentials,
    ) -> SubmissionOutcome {
        let mut attempts_made = 0;
        let mut last_error: Option<TransactionError> = None;

        for attempt in 0..self.max_attempts {
            attempts_made = attempt + 1;
            match self.sink.create_withdrawal(draft, source_account, credentials).await {
                Ok(created) => {
                    tracing::info!(id = %created.id, attempts_made, "Transaction created");
                    return SubmissionOutcome::Success { transaction_id: created.id };
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempts_made,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Error creating transaction"
                    );
                    let give_up = self.policy == RetryPolicy::TransientOnly && !e.is_transient();
                    last_error = Some(e);
                    if give_up {
                        break;
                    }
                    if attempts_made < self.max_attempts {
                        let wait = self.backoff_delay(attempt);
                        tracing::info!(wait_secs = wait.as_secs_f64(), "Retrying transaction");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let last = last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string());
        let noun = if attempts_made == 1 { "attempt" } else { "attempts" };
        let message = format!(
            "Failed to create transaction after {attempts_made} {noun}. Last error: {last}"
        );
        tracing::error!(attempts_made, "{message}");
        SubmissionOutcome::Failure { message, attempts_made }
    }
}
