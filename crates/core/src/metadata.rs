use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Groceries",
    "Dining",
    "Shopping",
    "Transportation",
    "Entertainment",
    "Other",
];

pub const DEFAULT_BUDGETS: &[&str] = &["Monthly", "Weekly", "Other"];

pub const DEFAULT_ASSET_ACCOUNTS: &[&str] = &["Cash wallet"];

/// Names fetched from the ledger for one request. Any list may be empty when
/// the ledger could not be reached; see [`LedgerMetadata::with_defaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    pub categories: Vec<String>,
    pub budgets: Vec<String>,
    pub asset_accounts: Vec<String>,
}

impl LedgerMetadata {
    /// Replaces every empty list with its built-in default.
    pub fn with_defaults(self) -> Self {
        LedgerMetadata {
            categories: or_default(self.categories, DEFAULT_CATEGORIES),
            budgets: or_default(self.budgets, DEFAULT_BUDGETS),
            asset_accounts: or_default(self.asset_accounts, DEFAULT_ASSET_ACCOUNTS),
        }
    }
}

/// Returns `names`, or `defaults` when `names` is empty.
pub fn or_default(names: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if names.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        names
    }
}
