use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::metadata::or_default;
use ledgerlens_core::{
    AppConfig, LedgerMetadata, ReviewedFields, SubmissionOutcome, DEFAULT_ASSET_ACCOUNTS,
};
use ledgerlens_extract::{
    ExtractedReceipt, GeminiConfig, GeminiModel, NormalizeOptions, ReceiptPipeline,
};
use ledgerlens_ledger::{LedgerClient, LedgerOptions, Submitter};

fn ledger_client(config: &AppConfig) -> LedgerClient {
    LedgerClient::new(LedgerOptions::from(&config.ledger))
}

/// Asset accounts to pay from, falling back to the built-in default.
pub async fn accounts(config: &AppConfig) -> Result<Vec<String>> {
    let credentials = config.credentials()?;
    let fetched = ledger_client(config).asset_accounts(&credentials).await;
    Ok(or_default(fetched, DEFAULT_ASSET_ACCOUNTS))
}

/// Every choice list the review form offers, with defaults filled in.
pub async fn metadata(config: &AppConfig) -> Result<LedgerMetadata> {
    let credentials = config.credentials()?;
    Ok(ledger_client(config).metadata(&credentials).await.with_defaults())
}

pub async fn extract(
    config: &AppConfig,
    image: &Path,
    account: &str,
    output: Option<&Path>,
) -> Result<ExtractedReceipt> {
    let credentials = config.credentials()?;
    let api_key = config.model_api_key()?.clone();
    let upload = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let filename = image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("receipt");

    let model = GeminiModel::new(GeminiConfig::from_model_config(&config.model, api_key));
    let pipeline = ReceiptPipeline::new(
        model,
        ledger_client(config),
        NormalizeOptions::from(&config.image),
    );
    let receipt = pipeline.extract(&upload, filename, account, &credentials).await?;
    if !receipt.category_is_known() {
        tracing::warn!(category = %receipt.category, "Category is not one of the ledger's; check it before submitting");
    }
    if !receipt.budget_is_known() {
        tracing::warn!(budget = %receipt.budget, "Budget is not one of the ledger's; check it before submitting");
    }

    if let Some(path) = output {
        write_json(path, &receipt)?;
        tracing::info!(path = %path.display(), "Wrote extracted receipt");
    }
    Ok(receipt)
}

pub async fn submit(config: &AppConfig, draft: &Path, account: &str) -> Result<SubmissionOutcome> {
    let credentials = config.credentials()?;
    let fields = read_draft(draft)?;
    let submitter = Submitter::from_config(ledger_client(config), &config.retry);
    Ok(submitter.submit_reviewed(fields, account, &credentials).await)
}

/// Reviewed fields from a JSON file. The output of `extract` is accepted as-is.
pub fn read_draft(path: &Path) -> Result<ReviewedFields> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a valid draft", path.display()))
}

fn write_json(path: &Path, receipt: &ExtractedReceipt) -> Result<()> {
    let json = serde_json::to_string_pretty(receipt)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgerlens_core::{AmountInput, ApiToken, Money, Tags};
    use ledgerlens_ledger::test_support::closed_port;
    use mockito::{Matcher, Server};

    fn config_for(base_url: String) -> AppConfig {
        let mut config = AppConfig::default();
        config.ledger.base_url = Some(base_url);
        config.ledger.api_token = Some(ApiToken::new("tok"));
        config.model.api_key = Some(ApiToken::new("key"));
        config
    }

    fn extracted() -> ExtractedReceipt {
        ExtractedReceipt {
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            amount: Some(Money::from_cents(1250).unwrap()),
            store_name: "Market".into(),
            description: "groceries".into(),
            category: "Groceries".into(),
            budget: "Weekly".into(),
            tags: Tags::default(),
            source_account: "Checking".into(),
            filename: "r.jpg".into(),
            available_categories: vec!["Groceries".into()],
            available_budgets: vec!["Weekly".into()],
        }
    }

    #[test]
    fn extract_output_is_a_valid_draft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        write_json(&path, &extracted()).unwrap();

        let fields = read_draft(&path).unwrap();
        assert_eq!(fields.store_name, "Market");
        assert_eq!(fields.date.as_deref(), Some("2024-01-10"));
        assert!(matches!(fields.amount, Some(AmountInput::Text(ref t)) if t == "12.50"));

        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(fields.into_draft(today).unwrap(), extracted().into_draft().unwrap());
    }

    #[test]
    fn hand_written_draft_with_numeric_amount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        std::fs::write(&path, r#"{"store_name": "Kiosk", "amount": 4.2}"#).unwrap();

        let fields = read_draft(&path).unwrap();
        assert_eq!(fields.store_name, "Kiosk");
        assert!(matches!(fields.amount, Some(AmountInput::Number(_))));
    }

    #[test]
    fn unreadable_draft_reports_path() {
        let err = read_draft(Path::new("/nonexistent/draft.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/draft.json"));
    }

    #[tokio::test]
    async fn metadata_fills_only_the_lists_the_ledger_could_not_give() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/categories")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":[{"attributes":{"name":"Groceries"}}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/budgets")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/accounts")
            .match_query(Matcher::UrlEncoded("type".into(), "asset".into()))
            .with_status(200)
            .with_body(r#"{"data":[{"attributes":{"name":"Checking"}}]}"#)
            .create_async()
            .await;

        let meta = metadata(&config_for(server.url())).await.unwrap();
        assert_eq!(meta.categories, vec!["Groceries"]);
        assert_eq!(meta.budgets, vec!["Monthly", "Weekly", "Other"]);
        assert_eq!(meta.asset_accounts, vec!["Checking"]);
    }

    #[tokio::test]
    async fn unreachable_ledger_lists_default_account() {
        let config = config_for(closed_port().await);
        assert_eq!(accounts(&config).await.unwrap(), vec!["Cash wallet"]);
        assert_eq!(metadata(&config).await.unwrap().categories.len(), 6);
    }
}
