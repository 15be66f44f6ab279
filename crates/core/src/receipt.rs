use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::{Money, MoneyError};

/// Marker tag attached to every transaction this tool creates.
pub const AUTOMATED_TAG: &str = "automated";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date, falling back to `today` when the text is
/// absent or garbled. Receipts routinely omit or mangle dates, so this is
/// lenient on purpose.
pub fn resolve_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.map(str::trim)
        .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
        .unwrap_or(today)
}

/// `"Purchase at {store}"`, used when a description comes back blank.
pub fn derived_description(store_name: &str) -> String {
    format!("Purchase at {store_name}")
}

/// Insertion-ordered, duplicate-free tag labels that always carry [`AUTOMATED_TAG`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Tags(vec![AUTOMATED_TAG.to_string()])
    }

    /// Adds a label unless it is blank or already present.
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.0.iter().any(|t| t == tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for Tags {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<String>> for Tags {
    fn from(labels: Vec<String>) -> Self {
        let mut tags = Tags::new();
        for label in &labels {
            tags.insert(label);
        }
        tags
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}

/// A receipt ready to be sent to the ledger as a withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDraft {
    pub date: NaiveDate,
    pub amount: Money,
    pub store_name: String,
    pub description: String,
    /// Expected to be one of the ledger's categories; not enforced.
    pub category: String,
    /// Expected to be one of the ledger's budgets; not enforced.
    pub budget: String,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),
    #[error("amount is required")]
    MissingAmount,
    #[error("store name is required")]
    MissingStoreName,
}

/// Amount as entered on the review form: either a JSON number or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    fn to_money(&self) -> Result<Money, DraftError> {
        let text = match self {
            AmountInput::Number(n) => n.to_string(),
            AmountInput::Text(s) if s.trim().is_empty() => return Err(DraftError::MissingAmount),
            AmountInput::Text(s) => s.clone(),
        };
        Ok(Money::parse(&text)?)
    }
}

/// Field values after human review, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedFields {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    pub store_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ReviewedFields {
    /// Validates the reviewed values. An unparseable date becomes `today`
    /// and a blank description is derived from the store name.
    pub fn into_draft(self, today: NaiveDate) -> Result<ReceiptDraft, DraftError> {
        let amount = self
            .amount
            .as_ref()
            .ok_or(DraftError::MissingAmount)?
            .to_money()?;

        let store_name = self.store_name.trim().to_string();
        if store_name.is_empty() {
            return Err(DraftError::MissingStoreName);
        }

        let description = match self.description.trim() {
            "" => derived_description(&store_name),
            d => d.to_string(),
        };

        Ok(ReceiptDraft {
            date: resolve_date(self.date.as_deref(), today),
            amount,
            store_name,
            description,
            category: self.category.trim().to_string(),
            budget: self.budget.trim().to_string(),
            tags: Tags::from(self.tags),
        })
    }
}
