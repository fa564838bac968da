use super::types::QueryResponse;
use crate::config::{account_endpoint, DEFAULT_QUERY_REQUEST_TIMEOUT, DEFAULT_QUERY_URL};
use crate::transport::{build_client, TransportError};
use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const QUERY_KEY_HEADER: &str = "X-Query-Key";

/// Shortest statement worth sending ("SELECT 1").
pub const MIN_NRQL_LENGTH: usize = 8;

static QUERY_ENDPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"api\.newrelic\.com/v1/accounts/[0-9]+/query").expect("valid pattern")
});

/// Runs NRQL queries against the query API.
pub struct QueryClient {
    client: reqwest::Client,
    url: Url,
    query_key: String,
    timeout: Duration,
}

impl QueryClient {
    pub fn new(query_key: impl Into<String>, account_id: &str) -> Result<Self> {
        Self::with_base_url(query_key, account_id, DEFAULT_QUERY_URL, DEFAULT_QUERY_REQUEST_TIMEOUT)
    }

    /// Query a non-default `.../v1/accounts` base (regional endpoints, mock servers).
    pub fn with_base_url(
        query_key: impl Into<String>,
        account_id: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let url = account_endpoint(base_url, account_id, "query")?;
        Ok(Self {
            client: build_client(timeout)?,
            url,
            query_key: query_key.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check the endpoint looks like a query URL and a key is present.
    pub fn validate(&self) -> Result<()> {
        if !QUERY_ENDPOINT.is_match(self.url.as_str()) {
            return Err(Error::validation_with_context(
                format!("invalid query endpoint {}", self.url),
                ErrorContext::new()
                    .with_field_path("url")
                    .with_source("query_client"),
            ));
        }
        if self.query_key.is_empty() {
            return Err(Error::validation_with_context(
                "not a valid query key",
                ErrorContext::new()
                    .with_field_path("query_key")
                    .with_source("query_client"),
            ));
        }
        Ok(())
    }

    /// Run `nrql` and decode the standard response shape.
    pub async fn query_events(&self, nrql: &str) -> Result<QueryResponse> {
        self.query(nrql).await
    }

    /// Run `nrql` and decode the body into `T`.
    pub async fn query<T: DeserializeOwned>(&self, nrql: &str) -> Result<T> {
        let url = self.query_url(nrql)?;
        debug!(%url, "query url");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(QUERY_KEY_HEADER, &self.query_key)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        if status != StatusCode::OK {
            return Err(Error::Remote {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }
        debug!(status = status.as_u16(), bytes = body.len(), "query response");

        Ok(serde_json::from_str(&body)?)
    }

    fn query_url(&self, nrql: &str) -> Result<Url> {
        if nrql.trim().len() < MIN_NRQL_LENGTH {
            return Err(Error::validation_with_context(
                format!("NRQL query is too short [{nrql}]"),
                ErrorContext::new()
                    .with_field_path("nrql")
                    .with_source("query_client"),
            ));
        }
        let mut url = self.url.clone();
        url.query_pairs_mut().clear().append_pair("nrql", nrql);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url_encodes_nrql() {
        let client = QueryClient::new("key", "123").unwrap();
        let url = client
            .query_url("SELECT count(*) FROM Transaction SINCE 1 hour ago")
            .unwrap();
        assert_eq!(url.path(), "/v1/accounts/123/query");
        let (k, v) = url.query_pairs().next().unwrap();
        assert_eq!(k, "nrql");
        assert_eq!(v, "SELECT count(*) FROM Transaction SINCE 1 hour ago");
    }

    #[test]
    fn test_short_query_rejected() {
        let client = QueryClient::new("key", "123").unwrap();
        assert!(matches!(
            client.query_url("SELECT"),
            Err(Error::Validation { .. })
        ));
        assert!(client.query_url("SELECT 1").is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(QueryClient::new("key", "123").unwrap().validate().is_ok());
        assert!(QueryClient::new("", "123").unwrap().validate().is_err());
        let local =
            QueryClient::with_base_url("key", "123", "http://localhost:9", Duration::from_secs(1))
                .unwrap();
        assert!(local.validate().is_err());
    }
}
