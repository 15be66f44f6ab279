use ledgerlens_core::{Credentials, LedgerConfig};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use std::time::Duration;
use uuid::Uuid;

/// Header Firefly III echoes into its own logs, letting a request be traced end to end.
pub const TRACE_HEADER: &str = "X-Trace-Id";

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerOptions {
    /// Timeout for metadata reads.
    pub read_timeout: Duration,
    /// Timeout for transaction writes. Must exceed the model call timeout.
    pub write_timeout: Duration,
    /// Send `error_if_duplicate_hash` so a retried write cannot create a duplicate.
    pub duplicate_guard: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(60),
            duplicate_guard: false,
        }
    }
}

impl From<&LedgerConfig> for LedgerOptions {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            duplicate_guard: config.duplicate_guard,
        }
    }
}

/// Firefly III REST client. Holds no credentials: every call takes them explicitly.
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    pub(crate) http: reqwest::Client,
    pub(crate) options: LedgerOptions,
}

impl LedgerClient {
    pub fn new(options: LedgerOptions) -> Self {
        Self { http: reqwest::Client::new(), options }
    }

    /// An authenticated JSON request against `{base_url}/api/v1/{path}`, tagged
    /// with a fresh trace id.
    pub(crate) fn request(
        &self,
        method: Method,
        credentials: &Credentials,
        path: &str,
        timeout: Duration,
    ) -> (RequestBuilder, Uuid) {
        let trace_id = Uuid::new_v4();
        let builder = self
            .http
            .request(method, credentials.api_url(path))
            .header(AUTHORIZATION, format!("Bearer {}", credentials.api_token.expose()))
            .header(ACCEPT, "application/json")
            .header(TRACE_HEADER, trace_id.to_string())
            .timeout(timeout);
        (builder, trace_id)
    }
}

impl Default for LedgerClient {
    fn default() -> Self {
        Self::new(LedgerOptions::default())
    }
}
