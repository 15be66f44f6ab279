pub mod client;
pub mod metadata;
pub mod submission;
pub mod transaction;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::{LedgerClient, LedgerOptions};
pub use submission::Submitter;
pub use transaction::{classify_status, ledger_timestamp, CreatedTransaction, TransactionError, TransactionSink};
