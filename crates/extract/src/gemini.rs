use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ledgerlens_core::{ApiToken, ModelConfig};
use serde_json::{json, Value};
use std::time::Duration;

use crate::model::{ModelError, ResponseSchema, VisionModel};
use crate::preprocess::NormalizedImage;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: ApiToken,
    /// Base URL up to and including the API version, e.g. `.../v1beta`.
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn from_model_config(config: &ModelConfig, api_key: ApiToken) -> Self {
        Self {
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Google Generative Language `generateContent` with a JSON response schema.
pub struct GeminiModel {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiModel {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_payload(image: &NormalizedImage, instruction: &str, schema: &ResponseSchema) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": instruction },
                    { "inlineData": { "mimeType": image.mime_type, "data": BASE64.encode(&image.bytes) } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema.as_json(),
            }
        })
    }

    fn map_error(status: u16, body: &str) -> ModelError {
        if status == 429 {
            return ModelError::RateLimited;
        }
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| body.chars().take(200).collect());
        ModelError::Api { status, message }
    }

    /// The first candidate's text part, parsed as JSON.
    fn parse_response(body: &Value) -> Result<Value, ModelError> {
        if let Some(reason) = body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
            return Err(ModelError::MalformedResponse(format!("prompt blocked: {reason}")));
        }
        let text = body
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .and_then(|parts| parts.iter().find_map(|p| p.get("text").and_then(Value::as_str)))
            .ok_or_else(|| ModelError::MalformedResponse("no candidate text in response".into()))?;
        serde_json::from_str(text).map_err(|e| ModelError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    async fn extract(
        &self,
        image: &NormalizedImage,
        instruction: &str,
        schema: &ResponseSchema,
    ) -> Result<Value, ModelError> {
        let payload = Self::build_payload(image, instruction, schema);
        tracing::info!(model = %self.config.model, bytes = image.bytes.len(), "Sending receipt to model");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.config.api_key.expose())
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(format!("no answer within {}s", self.config.timeout.as_secs()))
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(e.to_string())
            } else {
                ModelError::Network(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(Self::map_error(status.as_u16(), &text));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
        Self::parse_response(&body)
    }
}
