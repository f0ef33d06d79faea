//! Google Custom Search JSON API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SearchError;
use crate::pagemap;
use crate::types::{ProductSearch, SearchQuery, SearchResult};

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/customsearch/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub struct CseConfig {
    pub api_key: String,
    /// Programmable search engine id.
    pub cx: String,
    pub api_url: String,
    pub default_timeout: Duration,
}

impl std::fmt::Debug for CseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CseConfig")
            .field("cx", &self.cx)
            .field("api_url", &self.api_url)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl CseConfig {
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            cx: cx.into(),
            api_url: DEFAULT_API_URL.into(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load credentials from `GOOGLE_CSE_API_KEY` and `GOOGLE_CSE_CX`.
    /// Returns [`SearchError::NotConfigured`] unless both are set.
    pub fn from_env() -> Result<Self, SearchError> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match (var("GOOGLE_CSE_API_KEY"), var("GOOGLE_CSE_CX")) {
            (Some(key), Some(cx)) => Ok(Self::new(key, cx)),
            _ => Err(SearchError::NotConfigured),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

pub struct GoogleCseClient {
    client: reqwest::Client,
    config: CseConfig,
}

impl GoogleCseClient {
    pub fn new(config: CseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: CseConfig) -> Self {
        Self { client, config }
    }

    /// Ensure the response has a success status code, otherwise return
    /// [`SearchError::Api`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SearchError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ProductSearch for GoogleCseClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        let num = query.result_count.to_string();
        let lr = format!("lang_{}", query.locale.language);
        let timeout = query.timeout.unwrap_or(self.config.default_timeout);

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.cx.as_str()),
                ("q", query.text.as_str()),
                ("num", num.as_str()),
                ("lr", lr.as_str()),
                ("gl", query.locale.country.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await?;

        let body: WireResponse = Self::ensure_success(response).await?.json().await?;
        let results: Vec<SearchResult> = body.items.into_iter().map(WireItem::into_result).collect();
        tracing::debug!(query = %query.text, results = results.len(), "Web search finished");
        Ok(results)
    }
}

/// Stand-in used when no search engine is configured: every query comes
/// back empty, so sourcing yields no products.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSearch;

#[async_trait]
impl ProductSearch for DisabledSearch {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireResponse {
    /// Absent when the query has no hits.
    #[serde(default)]
    items: Vec<WireItem>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pagemap: Value,
}

impl WireItem {
    fn into_result(self) -> SearchResult {
        SearchResult {
            images: pagemap::image_candidates(&self.pagemap),
            price_hints: pagemap::price_hints(&self.pagemap),
            title: self.title,
            link: self.link,
            snippet: self.snippet.replace('\n', " "),
        }
    }
}
