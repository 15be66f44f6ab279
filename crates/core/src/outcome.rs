use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one submission call, after any internal retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success { transaction_id: String },
    Failure { message: String, attempts_made: u32 },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success { .. })
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Success { transaction_id } => Some(transaction_id),
            SubmissionOutcome::Failure { .. } => None,
        }
    }
}

/// The user-facing narrative, suitable for direct display.
impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Success { transaction_id } => {
                write!(f, "Transaction created successfully with ID: {transaction_id}")
            }
            SubmissionOutcome::Failure { message, .. } => f.write_str(message),
        }
    }
}
