use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::credentials::{ApiToken, Credentials};

pub const ENV_LEDGER_URL: &str = "FIREFLY_III_URL";
pub const ENV_LEDGER_TOKEN: &str = "FIREFLY_III_TOKEN";
pub const ENV_MODEL_API_KEY: &str = "GOOGLE_AI_API_KEY";
pub const ENV_MODEL_NAME: &str = "LEDGERLENS_MODEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Which submission failures the orchestrator retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry every failure kind, including authentication and validation errors.
    #[default]
    Uniform,
    /// Stop at the first non-transient failure (auth, permission, validation, 404).
    TransientOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub base_url: Option<String>,
    pub api_token: Option<ApiToken>,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Ask the ledger to reject transactions whose content hash already exists.
    pub duplicate_guard: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            read_timeout_secs: 30,
            write_timeout_secs: 60,
            duplicate_guard: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<ApiToken>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { max_width: 768, max_height: 768, jpeg_quality: 85 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub policy: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_secs: 3, policy: RetryPolicy::Uniform }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }
}

/// Process-wide settings. Loaded once at startup; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub model: ModelConfig,
    pub image: ImageConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults, then `path` (skipped if it does not exist), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay non-empty values from `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_LEDGER_URL) {
            self.ledger.base_url = Some(url);
        }
        if let Some(token) = get(ENV_LEDGER_TOKEN) {
            self.ledger.api_token = Some(ApiToken::new(token));
        }
        if let Some(key) = get(ENV_MODEL_API_KEY) {
            self.model.api_key = Some(ApiToken::new(key));
        }
        if let Some(model) = get(ENV_MODEL_NAME) {
            self.model.model = model;
        }
    }

    /// Every secret must be present before the process starts serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials()?;
        self.model_api_key()?;
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "image.jpeg_quality must be 1-100, got {}",
                self.image.jpeg_quality
            )));
        }
        if self.image.max_width == 0 || self.image.max_height == 0 {
            return Err(ConfigError::Invalid("image bounds must be non-zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.ledger.write_timeout_secs < 30 {
            return Err(ConfigError::Invalid(format!(
                "ledger.write_timeout_secs must be at least 30, got {}",
                self.ledger.write_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let base_url = self
            .ledger
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_LEDGER_URL))?;
        let token = self
            .ledger
            .api_token
            .as_ref()
            .filter(|t| !t.is_blank())
            .ok_or(ConfigError::Missing(ENV_LEDGER_TOKEN))?;
        Ok(Credentials::new(base_url, token.expose()))
    }

    pub fn model_api_key(&self) -> Result<&ApiToken, ConfigError> {
        self.model
            .api_key
            .as_ref()
            .filter(|k| !k.is_blank())
            .ok_or(ConfigError::Missing(ENV_MODEL_API_KEY))
    }
}
