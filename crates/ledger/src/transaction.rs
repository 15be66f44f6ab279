use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use ledgerlens_core::{Credentials, ReceiptDraft};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::client::LedgerClient;

/// Longest slice of an unexpected response body carried into an error message.
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Ledger API token is required to create a transaction")]
    MissingToken,
    #[error("Authentication failed: the ledger rejected the API token (it may be invalid or expired)")]
    Authentication,
    #[error("Permission denied: the API token is not allowed to create transactions")]
    Permission,
    #[error("Ledger endpoint not found at {url}; check the configured ledger URL")]
    EndpointNotFound { url: String },
    #[error("The ledger rejected the transaction: {message}")]
    Validation { message: String },
    #[error("The ledger reported a server error (HTTP {status}); try again later")]
    Server { status: u16 },
    #[error("Unexpected ledger response (HTTP {status}): {excerpt}")]
    Unexpected { status: u16, excerpt: String },
    #[error(
        "No response from the ledger within {}s (client-side timeout); the transaction may still have been recorded",
        .0.as_secs()
    )]
    Timeout(Duration),
    #[error("Could not connect to the ledger at {url}")]
    Connectivity { url: String },
    #[error("The ledger returned an unreadable response: {0}")]
    MalformedResponse(String),
}

impl TransactionError {
    /// Whether a retry has a realistic chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            TransactionError::Timeout(_)
            | TransactionError::Server { .. }
            | TransactionError::Connectivity { .. } => true,
            TransactionError::Unexpected { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// The ledger's acknowledgement of a stored transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTransaction {
    pub id: String,
    pub body: Value,
}

/// Anything that can record a withdrawal. [`LedgerClient`] is the real one.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    async fn create_withdrawal(
        &self,
        draft: &ReceiptDraft,
        source_account: &str,
        credentials: &Credentials,
    ) -> Result<CreatedTransaction, TransactionError>;
}

#[derive(Debug, Serialize)]
struct StoreTransactionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    error_if_duplicate_hash: Option<bool>,
    transactions: [WithdrawalSplit<'a>; 1],
}

#[derive(Debug, Serialize)]
struct WithdrawalSplit<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    date: String,
    amount: String,
    description: &'a str,
    destination_name: &'a str,
    source_name: &'a str,
    category_name: &'a str,
    budget_name: &'a str,
    tags: &'a [String],
}

/// Midnight of `date` as `YYYY-MM-DDTHH:MM:SS`; the ledger applies its own zone.
pub fn ledger_timestamp(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn build_payload<'a>(
    draft: &'a ReceiptDraft,
    source_account: &'a str,
    duplicate_guard: bool,
) -> StoreTransactionRequest<'a> {
    StoreTransactionRequest {
        error_if_duplicate_hash: duplicate_guard.then_some(true),
        transactions: [WithdrawalSplit {
            kind: "withdrawal",
            date: ledger_timestamp(draft.date),
            amount: draft.amount.to_ledger_string(),
            description: &draft.description,
            destination_name: &draft.store_name,
            source_name: source_account,
            category_name: &draft.category,
            budget_name: &draft.budget,
            tags: draft.tags.as_slice(),
        }],
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{cut}…")
    }
}

/// Map a non-success status and its body onto a [`TransactionError`].
pub fn classify_status(status: u16, body: &str, url: &str) -> TransactionError {
    match status {
        401 => TransactionError::Authentication,
        403 => TransactionError::Permission,
        404 => TransactionError::EndpointNotFound { url: url.to_string() },
        422 => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| excerpt(body));
            TransactionError::Validation { message }
        }
        s if s >= 500 => TransactionError::Server { status: s },
        s => TransactionError::Unexpected { status: s, excerpt: excerpt(body) },
    }
}

fn parse_created(body: &str) -> Result<CreatedTransaction, TransactionError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TransactionError::MalformedResponse(e.to_string()))?;
    let id = match value.pointer("/data/id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(TransactionError::MalformedResponse(
                "response has no transaction id".into(),
            ))
        }
    };
    Ok(CreatedTransaction { id, body: value })
}

impl LedgerClient {
    fn transport_error(&self, e: reqwest::Error, url: String) -> TransactionError {
        if e.is_timeout() {
            return TransactionError::Timeout(self.options.write_timeout);
        }
        if !e.is_connect() {
            tracing::debug!(error = %e, "Transport error talking to ledger");
        }
        TransactionError::Connectivity { url }
    }
}

#[async_trait]
impl TransactionSink for LedgerClient {
    async fn create_withdrawal(
        &self,
        draft: &ReceiptDraft,
        source_account: &str,
        credentials: &Credentials,
    ) -> Result<CreatedTransaction, TransactionError> {
        if credentials.api_token.is_blank() {
            return Err(TransactionError::MissingToken);
        }

        let url = credentials.api_url("transactions");
        let payload = build_payload(draft, source_account, self.options.duplicate_guard);
        let (builder, trace_id) = self.request(
            Method::POST,
            credentials,
            "transactions",
            self.options.write_timeout,
        );
        tracing::debug!(
            %trace_id,
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "Sending transaction to ledger"
        );

        let response = builder
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e, url.clone()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e, url.clone()))?;

        match status {
            200 | 201 => {
                let created = parse_created(&body)?;
                tracing::info!(%trace_id, id = %created.id, "Ledger stored transaction");
                Ok(created)
            }
            _ => {
                let err = classify_status(status, &body, &url);
                tracing::warn!(%trace_id, status, error = %err, "Ledger refused transaction");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port, hanging_server};
    use crate::client::LedgerOptions;
    use ledgerlens_core::{Money, Tags};
    use mockito::{Matcher, Server};

    fn draft() -> ReceiptDraft {
        ReceiptDraft {
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            amount: Money::from_cents(1250).unwrap(),
            store_name: "Market".into(),
            description: "groceries".into(),
            category: "Groceries".into(),
            budget: "Weekly".into(),
            tags: Tags::default(),
        }
    }

    fn client(write_timeout: Duration, duplicate_guard: bool) -> LedgerClient {
        LedgerClient::new(LedgerOptions {
            write_timeout,
            duplicate_guard,
            ..LedgerOptions::default()
        })
    }

    #[test]
    fn payload_matches_ledger_contract() {
        let d = draft();
        let json = serde_json::to_value(build_payload(&d, "Checking", false)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "transactions": [{
                    "type": "withdrawal",
                    "date": "2024-01-10T00:00:00",
                    "amount": "12.5",
                    "description": "groceries",
                    "destination_name": "Market",
                    "source_name": "Checking",
                    "category_name": "Groceries",
                    "budget_name": "Weekly",
                    "tags": ["automated"]
                }]
            })
        );
    }

    #[test]
    fn duplicate_guard_adds_hash_check() {
        let d = draft();
        let json = serde_json::to_value(build_payload(&d, "Checking", true)).unwrap();
        assert_eq!(json["error_if_duplicate_hash"], Value::Bool(true));
    }

    #[test]
    fn status_mapping() {
        let url = "https://l/api/v1/transactions";
        assert!(matches!(classify_status(401, "", url), TransactionError::Authentication));
        assert!(matches!(classify_status(403, "", url), TransactionError::Permission));
        assert!(matches!(
            classify_status(404, "", url),
            TransactionError::EndpointNotFound { .. }
        ));
        assert!(matches!(classify_status(500, "", url), TransactionError::Server { status: 500 }));
        assert!(matches!(classify_status(503, "", url), TransactionError::Server { status: 503 }));
        assert!(matches!(
            classify_status(418, "teapot", url),
            TransactionError::Unexpected { status: 418, .. }
        ));
    }

    #[test]
    fn validation_message_comes_from_body() {
        let body = r#"{"message":"The given data was invalid.","errors":{"transactions.0.amount":["bad"]}}"#;
        match classify_status(422, body, "u") {
            TransactionError::Validation { message } => {
                assert_eq!(message, "The given data was invalid.")
            }
            other => panic!("unexpected {other:?}"),
        }
        match classify_status(422, "plain text", "u") {
            TransactionError::Validation { message } => assert_eq!(message, "plain text"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn messages_are_readable() {
        assert!(TransactionError::Authentication.to_string().starts_with("Authentication failed"));
        let timeout = TransactionError::Timeout(Duration::from_secs(60)).to_string();
        assert!(timeout.contains("60s"));
        assert!(timeout.contains("client-side timeout"));
    }

    #[test]
    fn transient_kinds() {
        assert!(TransactionError::Server { status: 502 }.is_transient());
        assert!(TransactionError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(TransactionError::Connectivity { url: "u".into() }.is_transient());
        assert!(!TransactionError::Authentication.is_transient());
        assert!(!TransactionError::Validation { message: "m".into() }.is_transient());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), BODY_EXCERPT_CHARS + 1);
    }

    #[tokio::test]
    async fn created_transaction_returns_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/transactions")
            .match_header("authorization", "Bearer tok")
            .match_header("content-type", "application/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""type":"withdrawal""#.into()),
                Matcher::Regex(r#""destination_name":"Market""#.into()),
                Matcher::Regex(r#""source_name":"Checking""#.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"data":{"type":"transactions","id":"731","attributes":{}}}"#)
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        let created = client(Duration::from_secs(5), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap();
        assert_eq!(created.id, "731");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn created_status_201_is_success() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions")
            .with_status(201)
            .with_body(r#"{"data":{"id":42}}"#)
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        let created = client(Duration::from_secs(5), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap();
        assert_eq!(created.id, "42");
    }

    #[tokio::test]
    async fn success_without_id_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        let err = client(Duration::from_secs(5), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions")
            .with_status(401)
            .with_body(r#"{"message":"Unauthenticated."}"#)
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "expired");
        let err = client(Duration::from_secs(5), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::Authentication));
    }

    #[tokio::test]
    async fn unprocessable_carries_ledger_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/v1/transactions")
            .with_status(422)
            .with_body(r#"{"message":"Duplicate of transaction #12."}"#)
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        let err = client(Duration::from_secs(5), true)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The ledger rejected the transaction: Duplicate of transaction #12.");
    }

    #[tokio::test]
    async fn slow_ledger_times_out() {
        let creds = Credentials::new(hanging_server().await, "tok");
        let err = client(Duration::from_millis(200), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::Timeout(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_connectivity() {
        let creds = Credentials::new(closed_port().await, "tok");
        let err = client(Duration::from_secs(2), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::Connectivity { .. }));
    }

    #[tokio::test]
    async fn blank_token_is_rejected_before_sending() {
        let creds = Credentials::new("http://127.0.0.1:9", " ");
        let err = client(Duration::from_secs(1), false)
            .create_withdrawal(&draft(), "Checking", &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::MissingToken));
    }
}
