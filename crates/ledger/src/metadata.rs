use ledgerlens_core::{Credentials, LedgerMetadata};
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;

use crate::client::LedgerClient;

/// Upper bound on pages followed for a single collection.
const MAX_PAGES: u32 = 20;

#[derive(Debug, Error)]
enum MetadataError {
    #[error("token is missing")]
    MissingToken,
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("unreadable response body: {0}")]
    Body(reqwest::Error),
}

impl From<reqwest::Error> for MetadataError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MetadataError::Timeout
        } else {
            MetadataError::Transport(e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Collection {
    data: Vec<Resource>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct Attributes {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total_pages: u32,
}

impl Collection {
    fn total_pages(&self) -> u32 {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .map_or(1, |p| p.total_pages)
    }
}

// Metadata reads never fail: an unreachable ledger yields empty lists and the
// caller substitutes defaults.
impl LedgerClient {
    pub async fn categories(&self, credentials: &Credentials) -> Vec<String> {
        self.fetch_names(credentials, "categories", &[]).await
    }

    pub async fn budgets(&self, credentials: &Credentials) -> Vec<String> {
        self.fetch_names(credentials, "budgets", &[]).await
    }

    pub async fn asset_accounts(&self, credentials: &Credentials) -> Vec<String> {
        self.fetch_names(credentials, "accounts", &[("type", "asset")]).await
    }

    /// All three lists, fetched one after another. Empty lists are left empty.
    pub async fn metadata(&self, credentials: &Credentials) -> LedgerMetadata {
        LedgerMetadata {
            categories: self.categories(credentials).await,
            budgets: self.budgets(credentials).await,
            asset_accounts: self.asset_accounts(credentials).await,
        }
    }

    async fn fetch_names(
        &self,
        credentials: &Credentials,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Vec<String> {
        match self.try_fetch_names(credentials, resource, query).await {
            Ok(names) => {
                tracing::debug!(resource, count = names.len(), "Fetched ledger metadata");
                names
            }
            Err(e) => {
                tracing::warn!(resource, error = %e, "Could not fetch ledger metadata; continuing without it");
                Vec::new()
            }
        }
    }

    async fn try_fetch_names(
        &self,
        credentials: &Credentials,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<String>, MetadataError> {
        if credentials.api_token.is_blank() {
            return Err(MetadataError::MissingToken);
        }

        let mut names = Vec::new();
        let mut page = 1u32;
        loop {
            let page_param = page.to_string();
            let (builder, trace_id) =
                self.request(Method::GET, credentials, resource, self.options.read_timeout);
            let response = builder
                .query(query)
                .query(&[("page", page_param.as_str())])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                tracing::debug!(%trace_id, status = status.as_u16(), "Ledger rejected metadata read");
                return Err(MetadataError::Status(status.as_u16()));
            }

            let collection: Collection = response.json().await.map_err(MetadataError::Body)?;
            let total_pages = collection.total_pages();
            names.extend(collection.data.into_iter().map(|r| r.attributes.name));

            if page >= total_pages.min(MAX_PAGES) {
                break;
            }
            page += 1;
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port, hanging_server};
    use crate::client::LedgerOptions;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client() -> LedgerClient {
        LedgerClient::new(LedgerOptions {
            read_timeout: Duration::from_millis(300),
            ..LedgerOptions::default()
        })
    }

    fn names_body(names: &[&str], total_pages: u32) -> String {
        let data: Vec<_> = names
            .iter()
            .map(|n| serde_json::json!({"type": "x", "id": "1", "attributes": {"name": n}}))
            .collect();
        serde_json::json!({
            "data": data,
            "meta": {"pagination": {"total_pages": total_pages}}
        })
        .to_string()
    }

    #[tokio::test]
    async fn categories_returns_attribute_names() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/categories")
            .match_header("authorization", "Bearer tok")
            .match_header("accept", "application/json")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(names_body(&["Groceries", "Other"], 1))
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        assert_eq!(client().categories(&creds).await, vec!["Groceries", "Other"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn asset_accounts_filters_by_type_and_follows_pages() {
        let mut server = Server::new_async().await;
        let page1 = server
            .mock("GET", "/api/v1/accounts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "asset".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(names_body(&["Checking"], 2))
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/api/v1/accounts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "asset".into()),
                Matcher::UrlEncoded("page".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(names_body(&["Cash wallet"], 2))
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        assert_eq!(client().asset_accounts(&creds).await, vec!["Checking", "Cash wallet"]);
        page1.assert_async().await;
        page2.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_yields_empty_list() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/budgets")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        assert!(client().budgets(&creds).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_yields_empty_list() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/budgets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "tok");
        assert!(client().budgets(&creds).await.is_empty());
    }

    #[tokio::test]
    async fn timeout_yields_empty_list() {
        let creds = Credentials::new(hanging_server().await, "tok");
        assert!(client().categories(&creds).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_ledger_yields_empty_metadata() {
        let creds = Credentials::new(closed_port().await, "tok");
        let meta = client().metadata(&creds).await;
        assert_eq!(meta, LedgerMetadata::default());
    }

    #[tokio::test]
    async fn blank_token_skips_the_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/categories")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let creds = Credentials::new(server.url(), "");
        assert!(client().categories(&creds).await.is_empty());
        mock.assert_async().await;
    }
}
