pub mod config;
pub mod credentials;
pub mod metadata;
pub mod money;
pub mod outcome;
pub mod receipt;

pub use config::{AppConfig, ConfigError, ImageConfig, LedgerConfig, ModelConfig, RetryConfig, RetryPolicy};
pub use credentials::{ApiToken, Credentials};
pub use metadata::{LedgerMetadata, DEFAULT_ASSET_ACCOUNTS, DEFAULT_BUDGETS, DEFAULT_CATEGORIES};
pub use money::{Money, MoneyError};
pub use outcome::SubmissionOutcome;
pub use receipt::{
    derived_description, resolve_date, AmountInput, DraftError, ReceiptDraft, ReviewedFields, Tags,
    AUTOMATED_TAG, DATE_FORMAT,
};
