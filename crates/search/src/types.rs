use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Largest page size the search API accepts.
pub const MAX_RESULT_COUNT: u8 = 10;

/// Language and country bias for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    /// ISO 639-1 code, e.g. `fr`.
    pub language: String,
    /// ISO 3166-1 alpha-2 code, e.g. `fr`.
    pub country: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: "fr".into(),
            country: "fr".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    /// Clamped to `1..=10`.
    pub result_count: u8,
    pub locale: Locale,
    pub timeout: Option<Duration>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, result_count: u8, locale: Locale) -> Self {
        Self {
            text: text.into(),
            result_count: result_count.clamp(1, MAX_RESULT_COUNT),
            locale,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Raw price fields found in a result's structured metadata. Values are
/// left as text; interpreting them is the caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHints {
    pub product_price: Option<String>,
    pub product_currency: Option<String>,
    pub offer_price: Option<String>,
    pub offer_currency: Option<String>,
    /// `product:price:amount` / `og:price:amount` metatags.
    pub meta_price: Option<String>,
    pub meta_currency: Option<String>,
}

/// One search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    /// Image URLs from structured metadata in preference order: product
    /// data, page image, Open-Graph image, thumbnail.
    pub images: Vec<String>,
    pub price_hints: PriceHints,
}

/// A web search engine.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_count_is_clamped() {
        assert_eq!(SearchQuery::new("q", 0, Locale::default()).result_count, 1);
        assert_eq!(SearchQuery::new("q", 50, Locale::default()).result_count, 10);
        assert_eq!(SearchQuery::new("q", 5, Locale::default()).result_count, 5);
    }
}
