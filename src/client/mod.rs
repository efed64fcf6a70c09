// src/client/mod.rs

pub mod recorder;
pub mod throttle;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::{AppConfig, MAX_CONNECT_ATTEMPTS, REQUEST_TIMEOUT_SECS};
use crate::error::SyncError;
use crate::models::CandidateOrganization;

pub use recorder::{AuditTarget, ResponseRecorder};
pub use throttle::RequestThrottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Domain,
    Name,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Domain => "domain name",
            QueryKind::Name => "company name",
        }
    }
}

/// Outcome of one provider query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub items: Vec<CandidateOrganization>,
    /// HTTP status code returned by the provider
    pub raw_status: u16,
    /// Response body as received, kept for audit output
    pub raw: Value,
}

impl QueryResult {
    pub fn empty(raw_status: u16) -> Self {
        Self {
            items: Vec::new(),
            raw_status,
            raw: Value::Null,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Source of candidate organizations. Implemented by [`QueryClient`] for the
/// real provider; tests substitute scripted directories.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn query_by_domain(&self, domain: &str, since: Option<NaiveDate>) -> Result<QueryResult>;

    async fn query_by_name(&self, name: &str) -> Result<QueryResult>;
}

/// HTTP client for the provider's organization search endpoint.
pub struct QueryClient {
    http: Client,
    url: String,
    api_key: String,
}

impl QueryClient {
    /// Opens a session with the provider, retrying with a linear backoff
    /// (`base * attempt`). Gives up after [`MAX_CONNECT_ATTEMPTS`] with
    /// [`SyncError::ConnectFailed`], which aborts the run.
    pub async fn connect_or_fail(config: &AppConfig) -> Result<Self, SyncError> {
        Self::connect_with_backoff(config, config.connect_backoff()).await
    }

    pub async fn connect_with_backoff(
        config: &AppConfig,
        backoff_base: Duration,
    ) -> Result<Self, SyncError> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            match Self::try_connect(config).await {
                Ok(client) => {
                    info!("Connected to provider at {}", config.base_url);
                    return Ok(client);
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    if attempt < MAX_CONNECT_ATTEMPTS {
                        let delay = backoff_base * attempt;
                        warn!(
                            "connection failure {}: sleeping {:?} (attempt {}/{})",
                            last_error,
                            delay,
                            attempt,
                            MAX_CONNECT_ATTEMPTS
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(SyncError::ConnectFailed {
            attempts: MAX_CONNECT_ATTEMPTS,
            last_error,
        })
    }

    async fn try_connect(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        // Any HTTP answer proves the provider is reachable; only transport errors count.
        let probe = http
            .get(&config.base_url)
            .send()
            .await
            .with_context(|| format!("Provider at {} is unreachable", config.base_url))?;
        debug!("Provider probe returned status {}", probe.status());

        Ok(Self {
            http,
            url: config.query_url(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn run_query(
        &self,
        kind: QueryKind,
        key: &str,
        params: &[(&str, String)],
    ) -> Result<QueryResult> {
        let mut query: Vec<(&str, String)> = vec![("user_key", self.api_key.clone())];
        query.extend(params.iter().cloned());

        let response = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to query provider by {} '{}'", kind.as_str(), key))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Get url {} returns status {}", self.url, status.as_u16());
            let body = response.text().await.unwrap_or_default();
            let raw = serde_json::from_str(&body).unwrap_or(Value::String(body));
            return Ok(QueryResult {
                raw,
                ..QueryResult::empty(status.as_u16())
            });
        }

        let raw: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to decode provider response for '{}'", key))?;
        let items = parse_items(&raw);

        if items.is_empty() {
            info!("Nothing found for {} {}", kind.as_str(), key);
        } else {
            info!("FOUND {} ({}) item(s)", key, items.len());
        }

        Ok(QueryResult {
            items,
            raw_status: status.as_u16(),
            raw,
        })
    }
}

#[async_trait]
impl CompanyDirectory for QueryClient {
    async fn query_by_domain(&self, domain: &str, since: Option<NaiveDate>) -> Result<QueryResult> {
        let mut params = vec![("domain_name", domain.to_string())];
        if let Some(ts) = since
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
        {
            params.push(("updated_since", ts.to_string()));
        }
        self.run_query(QueryKind::Domain, domain, &params).await
    }

    async fn query_by_name(&self, name: &str) -> Result<QueryResult> {
        self.run_query(QueryKind::Name, name, &[("name", name.to_string())])
            .await
    }
}

/// Pulls `data.items[].properties` out of a provider response. Items that
/// don't decode are logged and skipped.
pub fn parse_items(raw: &Value) -> Vec<CandidateOrganization> {
    let Some(items) = raw.pointer("/data/items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let props = item.get("properties")?;
            match serde_json::from_value::<CandidateOrganization>(props.clone()) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    warn!("Skipping undecodable provider item: {}", e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_items_reads_properties() {
        let raw = json!({
            "data": {
                "items": [
                    {"type": "OdmOrganization", "properties": {"name": "Acme", "domain": "acme.com"}},
                    {"type": "OdmOrganization", "properties": {"name": "Acme Labs", "domain": null}},
                    {"type": "OdmOrganization"}
                ]
            }
        });
        let items = parse_items(&raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].domain.as_deref(), Some("acme.com"));
        assert!(items[1].domain.is_none());
    }

    #[test]
    fn test_parse_items_tolerates_unexpected_shapes() {
        assert!(parse_items(&json!({"error": "bad key"})).is_empty());
        assert!(parse_items(&Value::Null).is_empty());
        assert!(parse_items(&json!({"data": {"items": {}}})).is_empty());
    }

    #[test]
    fn test_bad_item_is_skipped() {
        let raw = json!({"data": {"items": [
            {"properties": {"name": "Acme", "created_at": "not a number"}},
            {"properties": {"name": "Zenith"}}
        ]}});
        let items = parse_items(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_name(), "Zenith");
    }
}
