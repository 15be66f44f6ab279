use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger personal access token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        ApiToken(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// Where and as whom to talk to the ledger. Passed explicitly into every
/// ledger call so single- and multi-tenant callers share the same code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub base_url: String,
    pub api_token: ApiToken,
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Credentials {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: ApiToken::new(api_token),
        }
    }

    /// `{base_url}/api/v1/{path}`
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
