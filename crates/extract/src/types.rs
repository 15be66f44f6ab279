use chrono::NaiveDate;
use ledgerlens_core::{AmountInput, DraftError, Money, ReceiptDraft, ReviewedFields, Tags, DATE_FORMAT};
use serde::{Deserialize, Serialize};

/// What the model read off a receipt, cleaned up and ready for human review,
/// plus the choices the review form should offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub date: NaiveDate,
    /// `None` when the model produced no usable positive amount.
    pub amount: Option<Money>,
    pub store_name: String,
    pub description: String,
    pub category: String,
    pub budget: String,
    pub tags: Tags,
    pub source_account: String,
    pub filename: String,
    pub available_categories: Vec<String>,
    pub available_budgets: Vec<String>,
}

impl ExtractedReceipt {
    /// Pre-filled review form values.
    pub fn to_reviewed_fields(&self) -> ReviewedFields {
        ReviewedFields {
            date: Some(self.date.format(DATE_FORMAT).to_string()),
            amount: self.amount.map(|m| AmountInput::Text(m.to_string())),
            store_name: self.store_name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            budget: self.budget.clone(),
            tags: self.tags.as_slice().to_vec(),
        }
    }

    /// Accept the extraction as-is, without edits.
    pub fn into_draft(self) -> Result<ReceiptDraft, DraftError> {
        let amount = self.amount.ok_or(DraftError::MissingAmount)?;
        if self.store_name.trim().is_empty() {
            return Err(DraftError::MissingStoreName);
        }
        Ok(ReceiptDraft {
            date: self.date,
            amount,
            store_name: self.store_name,
            description: self.description,
            category: self.category,
            budget: self.budget,
            tags: self.tags,
        })
    }

    pub fn category_is_known(&self) -> bool {
        self.available_categories.iter().any(|c| c == &self.category)
    }

    pub fn budget_is_known(&self) -> bool {
        self.available_budgets.iter().any(|b| b == &self.budget)
    }
}
