use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use thiserror::Error;

use crate::preprocess::NormalizedImage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Model request timed out: {0}")]
    Timeout(String),
    #[error("Model rate limit exceeded")]
    RateLimited,
    #[error("Model API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Network error reaching model provider: {0}")]
    Network(String),
    #[error("Model response could not be read: {0}")]
    MalformedResponse(String),
}

impl ModelError {
    /// Providers don't agree on how a timeout is reported, so the message text
    /// is checked as well as the variant.
    pub fn is_timeout(&self) -> bool {
        if matches!(self, ModelError::Timeout(_)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.contains("timeout") || text.contains("timed out") || text.contains("deadline")
    }
}

/// A JSON object schema the model's answer must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    value: Value,
}

impl ResponseSchema {
    pub const RECEIPT_FIELDS: [(&'static str, &'static str); 6] = [
        ("date", "STRING"),
        ("amount", "NUMBER"),
        ("store_name", "STRING"),
        ("description", "STRING"),
        ("category", "STRING"),
        ("budget", "STRING"),
    ];

    /// `{date, amount, store_name, description, category, budget}`, all required.
    pub fn receipt() -> Self {
        let properties: serde_json::Map<String, Value> = Self::RECEIPT_FIELDS
            .iter()
            .map(|(name, ty)| (name.to_string(), json!({ "type": ty })))
            .collect();
        let names: Vec<&str> = Self::RECEIPT_FIELDS.iter().map(|(n, _)| *n).collect();
        Self {
            value: json!({
                "type": "OBJECT",
                "properties": properties,
                "required": names.clone(),
                "propertyOrdering": names,
            }),
        }
    }

    pub fn as_json(&self) -> &Value {
        &self.value
    }
}

/// A multimodal model that answers an instruction about an image with a JSON
/// object shaped by `schema`.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn extract(
        &self,
        image: &NormalizedImage,
        instruction: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, ModelError>;
}

// ── Mock backend (used for tests) ─────────────────────────────────────────────

/// Returns a preset answer or error and remembers the last instruction it saw.
pub struct MockModel {
    response: Result<Value, ModelError>,
    last_instruction: Mutex<Option<String>>,
}

impl MockModel {
    pub fn returning(value: Value) -> Self {
        Self { response: Ok(value), last_instruction: Mutex::new(None) }
    }

    pub fn failing(error: ModelError) -> Self {
        Self { response: Err(error), last_instruction: Mutex::new(None) }
    }

    pub fn last_instruction(&self) -> Option<String> {
        self.last_instruction.lock().ok().and_then(|g| g.clone())
    }
}

#[async_trait]
impl VisionModel for MockModel {
    async fn extract(
        &self,
        _image: &NormalizedImage,
        instruction: &str,
        _schema: &ResponseSchema,
    ) -> Result<Value, ModelError> {
        if let Ok(mut last) = self.last_instruction.lock() {
            *last = Some(instruction.to_string());
        }
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> NormalizedImage {
        NormalizedImage {
            bytes: vec![0xFF, 0xD8],
            filename: "r.jpg".into(),
            mime_type: "image/jpeg",
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn receipt_schema_requires_every_field() {
        let schema = ResponseSchema::receipt();
        let v = schema.as_json();
        assert_eq!(v["type"], "OBJECT");
        assert_eq!(v["properties"]["amount"]["type"], "NUMBER");
        assert_eq!(v["properties"]["store_name"]["type"], "STRING");
        assert_eq!(v["required"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn timeout_detected_by_variant_or_text() {
        assert!(ModelError::Timeout("60s".into()).is_timeout());
        assert!(ModelError::Network("operation timed out".into()).is_timeout());
        assert!(ModelError::Api { status: 504, message: "Deadline exceeded".into() }.is_timeout());
        assert!(!ModelError::RateLimited.is_timeout());
    }

    #[tokio::test]
    async fn mock_returns_preset_and_records_instruction() {
        let m = MockModel::returning(json!({"amount": 5.5}));
        let out = m.extract(&image(), "read this", &ResponseSchema::receipt()).await.unwrap();
        assert_eq!(out["amount"], 5.5);
        assert_eq!(m.last_instruction().as_deref(), Some("read this"));
    }

    #[tokio::test]
    async fn mock_can_fail() {
        let m = MockModel::failing(ModelError::RateLimited);
        let err = m.extract(&image(), "x", &ResponseSchema::receipt()).await.unwrap_err();
        assert_eq!(err, ModelError::RateLimited);
    }
}
