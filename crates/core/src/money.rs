use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strictly positive amount in the ledger's single currency, rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount must be greater than zero, got {0}")]
    NotPositive(Decimal),
    #[error("'{0}' is not a valid amount")]
    Unparseable(String),
}

impl Money {
    pub fn from_decimal(decimal: Decimal) -> Result<Self, MoneyError> {
        let rounded = decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if rounded <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(rounded));
        }
        Ok(Money(rounded))
    }

    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        Self::from_decimal(Decimal::new(cents, 2))
    }

    /// Parse user- or model-supplied text such as `"12.50"`, `"$1,234.5"`,
    /// `"12,50"` or `" 7 "`. A leading `-` or an accounting `(4.20)` parses
    /// as negative and is then rejected like any other non-positive amount.
    pub fn parse(text: &str) -> Result<Self, MoneyError> {
        let unparseable = || MoneyError::Unparseable(text.trim().to_string());
        let cleaned: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ' '))
            .collect();
        let (negative, body) = match cleaned.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            Some(inner) => (true, inner),
            None => match cleaned.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, cleaned.as_str()),
            },
        };
        let normalized = normalize_separators(body);
        let decimal = Decimal::from_str(&normalized)
            .or_else(|_| Decimal::from_scientific(&normalized))
            .map_err(|_| unparseable())?;
        Self::from_decimal(if negative { -decimal } else { decimal })
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// The amount as the ledger expects it: plain decimal text without
    /// trailing zeros (`12.5`, `3`, `0.99`).
    pub fn to_ledger_string(self) -> String {
        self.0.normalize().to_string()
    }
}

/// Rewrite grouping and decimal separators into plain `1234.56` form.
///
/// When both `.` and `,` appear, the later one is the decimal separator. A
/// lone comma followed by exactly three digits groups thousands (`1,250`);
/// any other lone comma is a decimal comma (`12,50`). Repeated separators of
/// one kind are grouping.
fn normalize_separators(text: &str) -> String {
    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');
    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (None, Some(comma)) => {
            let grouped = text.matches(',').count() > 1 || text.len() - comma - 1 == 3;
            if grouped {
                text.replace(',', "")
            } else {
                text.replace(',', ".")
            }
        }
        (Some(_), None) if text.matches('.').count() > 1 => text.replace('.', ""),
        _ => text.to_string(),
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}
