use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use ledgerlens_core::{derived_description, resolve_date, Money, Tags};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// First amount in free text: "$1,234.56", "12,50 EUR", "Total: 7", "-4.20", "(4.20)".
re!(
    re_amount,
    r"\(\s*\$?\s*(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:[.,]\d{1,2})?)\s*\)|-?\s*\$?\s*(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:[.,]\d{1,2})?)"
);

/// Receipt fields after cleanup, before the caller attaches context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub date: NaiveDate,
    pub amount: Option<Money>,
    pub store_name: String,
    pub description: String,
    pub category: String,
    pub budget: String,
    pub tags: Tags,
}

pub struct FieldParser;

impl FieldParser {
    /// Turn the model's JSON object into receipt fields. Only the date is
    /// corrected (to `today`); everything else is surfaced for review.
    pub fn parse(
        fields: &serde_json::Map<String, Value>,
        categories: &[String],
        budgets: &[String],
        today: NaiveDate,
    ) -> ParsedFields {
        let raw_date = fields.get("date").and_then(Value::as_str);
        let date = resolve_date(raw_date, today);
        if raw_date.map(str::trim) != Some(date.to_string().as_str()) {
            tracing::warn!(raw = ?raw_date, %date, "Invalid or missing receipt date; using today");
        }

        let amount = fields.get("amount").and_then(Self::parse_amount);
        if amount.is_none() {
            tracing::warn!(raw = ?fields.get("amount"), "No usable amount in model output");
        }

        let store_name = Self::text(fields.get("store_name"));
        let description = match Self::text(fields.get("description")) {
            d if d.is_empty() && !store_name.is_empty() => derived_description(&store_name),
            d => d,
        };

        ParsedFields {
            date,
            amount,
            description,
            category: Self::canonical_choice(&Self::text(fields.get("category")), categories),
            budget: Self::canonical_choice(&Self::text(fields.get("budget")), budgets),
            store_name,
            tags: Tags::new(),
        }
    }

    /// A JSON number, or text containing one. Non-positive values, including
    /// `-4.20` and `(4.20)` refund lines, are dropped.
    pub fn parse_amount(value: &Value) -> Option<Money> {
        match value {
            Value::Number(n) => {
                let text = n.to_string();
                let decimal = Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .ok()?;
                Money::from_decimal(decimal).ok()
            }
            Value::String(s) => Money::parse(re_amount().find(s)?.as_str()).ok(),
            _ => None,
        }
    }

    fn text(value: Option<&Value>) -> String {
        match value {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    /// The model's pick spelled the way the ledger spells it, when it matches
    /// a choice case-insensitively; otherwise left as the model wrote it.
    fn canonical_choice(picked: &str, choices: &[String]) -> String {
        choices
            .iter()
            .find(|c| c.eq_ignore_ascii_case(picked))
            .cloned()
            .unwrap_or_else(|| picked.to_string())
    }
}
