use chrono::{Local, NaiveDate};
use ledgerlens_core::metadata::or_default;
use ledgerlens_core::{Credentials, DEFAULT_BUDGETS, DEFAULT_CATEGORIES};
use ledgerlens_ledger::LedgerClient;
use thiserror::Error;

use crate::extract::FieldParser;
use crate::model::{ModelError, ResponseSchema, VisionModel};
use crate::preprocess::{self, NormalizeOptions, PreprocessError};
use crate::prompt;
use crate::types::ExtractedReceipt;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Could not process the uploaded image: {0}")]
    Image(#[from] PreprocessError),
    #[error("The image processing timed out. Please try again with a smaller or clearer image.")]
    Timeout(#[source] ModelError),
    #[error("Receipt analysis failed: {0}")]
    Model(#[source] ModelError),
    #[error("Receipt analysis returned an unexpected shape: {0}")]
    MalformedOutput(String),
    #[error("Image processing worker failed: {0}")]
    Worker(String),
}

impl From<ModelError> for ExtractionError {
    fn from(e: ModelError) -> Self {
        if e.is_timeout() {
            ExtractionError::Timeout(e)
        } else {
            ExtractionError::Model(e)
        }
    }
}

/// Orchestrates: normalize → fetch choices → prompt → model → parse.
///
/// Stateless between calls; every extraction is a full re-run with no caching.
pub struct ReceiptPipeline<M: VisionModel> {
    model: M,
    ledger: LedgerClient,
    image_options: NormalizeOptions,
    schema: ResponseSchema,
}

impl<M: VisionModel> ReceiptPipeline<M> {
    pub fn new(model: M, ledger: LedgerClient, image_options: NormalizeOptions) -> Self {
        Self { model, ledger, image_options, schema: ResponseSchema::receipt() }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Extract a draft from an uploaded receipt image, dating it against the local clock.
    pub async fn extract(
        &self,
        upload: &[u8],
        filename: &str,
        source_account: &str,
        credentials: &Credentials,
    ) -> Result<ExtractedReceipt, ExtractionError> {
        self.extract_on(upload, filename, source_account, credentials, Local::now().date_naive())
            .await
    }

    #[tracing::instrument(skip_all, fields(filename = filename, source_account = source_account))]
    pub async fn extract_on(
        &self,
        upload: &[u8],
        filename: &str,
        source_account: &str,
        credentials: &Credentials,
        today: NaiveDate,
    ) -> Result<ExtractedReceipt, ExtractionError> {
        // 1. Normalize image, off the async workers.
        let data = upload.to_vec();
        let name = filename.to_string();
        let options = self.image_options;
        let image = tokio::task::spawn_blocking(move || {
            preprocess::normalize_image(&data, &name, &options)
        })
        .await
        .map_err(|e| ExtractionError::Worker(e.to_string()))??;
        tracing::info!(width = image.width, height = image.height, bytes = image.bytes.len(), "Image processed");

        // 2. Fetch choices; an unreachable ledger falls back to defaults.
        let fetched_categories = self.ledger.categories(credentials).await;
        let fetched_budgets = self.ledger.budgets(credentials).await;
        if fetched_categories.is_empty() {
            tracing::warn!("Using default categories; ledger returned none");
        }
        if fetched_budgets.is_empty() {
            tracing::warn!("Using default budgets; ledger returned none");
        }
        let categories = or_default(fetched_categories, DEFAULT_CATEGORIES);
        let budgets = or_default(fetched_budgets, DEFAULT_BUDGETS);

        // 3. Prompt.
        let instruction = prompt::build_instruction(&categories, &budgets, today);

        // 4–5. Model call.
        tracing::info!("Sending request to model for analysis");
        let answer = self.model.extract(&image, &instruction, &self.schema).await.map_err(|e| {
            tracing::error!(error = %e, "Model analysis failed");
            ExtractionError::from(e)
        })?;
        let fields = answer.as_object().ok_or_else(|| {
            ExtractionError::MalformedOutput(format!("expected a JSON object, got {answer}"))
        })?;

        // 6. Parse and default.
        let parsed = FieldParser::parse(fields, &categories, &budgets, today);
        tracing::info!(
            store = %parsed.store_name,
            amount = ?parsed.amount.map(|m| m.to_string()),
            date = %parsed.date,
            "Extracted receipt"
        );

        // 7. Assemble.
        Ok(ExtractedReceipt {
            date: parsed.date,
            amount: parsed.amount,
            store_name: parsed.store_name,
            description: parsed.description,
            category: parsed.category,
            budget: parsed.budget,
            tags: parsed.tags,
            source_account: source_account.to_string(),
            filename: image.filename,
            available_categories: categories,
            available_budgets: budgets,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
