//! Query variation ladder for one candidate.
//!
//! Each rung rewrites the candidate's search term; rungs are tried in
//! [`QUERY_LADDER`] order and sourcing stops at the first result carrying
//! an acceptable image.

use std::time::Duration;

use roomcraft_core::catalog::ImageFilter;
use roomcraft_search::{Locale, ProductSearch, SearchQuery, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryVariation {
    /// "<term> buy", in the search language.
    Buy,
    /// "<term> price", in the search language.
    Price,
    Bare,
}

pub const QUERY_LADDER: [QueryVariation; 3] =
    [QueryVariation::Buy, QueryVariation::Price, QueryVariation::Bare];

impl QueryVariation {
    pub fn apply(self, term: &str, locale: &Locale) -> String {
        let term = term.trim();
        let (buy, price) = shopping_words(&locale.language);
        match self {
            Self::Buy => format!("{term} {buy}"),
            Self::Price => format!("{term} {price}"),
            Self::Bare => term.to_string(),
        }
    }
}

fn shopping_words(language: &str) -> (&'static str, &'static str) {
    match language.to_ascii_lowercase().as_str() {
        "fr" => ("acheter", "prix"),
        "de" => ("kaufen", "preis"),
        "es" => ("comprar", "precio"),
        "it" => ("acquistare", "prezzo"),
        _ => ("buy", "price"),
    }
}

/// A search hit accepted for a candidate.
#[derive(Debug, Clone)]
pub struct SourcedHit {
    pub result: SearchResult,
    /// First acceptable image URL of the hit.
    pub image_url: String,
    /// The query variation that produced it.
    pub query: String,
}

/// Search parameters shared by every candidate of a run.
#[derive(Debug, Clone)]
pub struct SourcingParams<'a> {
    pub filter: &'a ImageFilter,
    pub locale: &'a Locale,
    pub results_per_query: u8,
    pub timeout: Duration,
}

/// Walk the ladder for `term`. Search errors skip to the next rung; `None`
/// means every rung came back without an acceptable image.
pub async fn source_term(
    search: &dyn ProductSearch,
    term: &str,
    params: &SourcingParams<'_>,
) -> Option<SourcedHit> {
    let mut tried: Vec<String> = Vec::with_capacity(QUERY_LADDER.len());
    for variation in QUERY_LADDER {
        let text = variation.apply(term, params.locale);
        if text.is_empty() || tried.contains(&text) {
            continue;
        }
        tried.push(text.clone());

        let query = SearchQuery::new(text.clone(), params.results_per_query, params.locale.clone())
            .with_timeout(params.timeout);
        let results = match search.search(&query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(stage = "shop", query = %text, error = %e, "Search failed, trying next variation");
                continue;
            }
        };

        if let Some(hit) = first_with_image(results, params.filter, &text) {
            tracing::debug!(stage = "shop", query = %text, link = %hit.result.link, "Found product with image");
            return Some(hit);
        }
        tracing::debug!(stage = "shop", query = %text, "No acceptable image, trying next variation");
    }
    tracing::info!(stage = "shop", term, "No product with an acceptable image");
    None
}

fn first_with_image(results: Vec<SearchResult>, filter: &ImageFilter, query: &str) -> Option<SourcedHit> {
    results.into_iter().find_map(|result| {
        let image_url = filter
            .first_acceptable(result.images.iter().map(String::as_str))?
            .to_string();
        Some(SourcedHit {
            result,
            image_url,
            query: query.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{result, ScriptedSearch};

    fn params<'a>(filter: &'a ImageFilter, locale: &'a Locale) -> SourcingParams<'a> {
        SourcingParams {
            filter,
            locale,
            results_per_query: 5,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn ladder_words_follow_language() {
        let fr = Locale::default();
        assert_eq!(QueryVariation::Buy.apply("table basse", &fr), "table basse acheter");
        assert_eq!(QueryVariation::Price.apply("table basse", &fr), "table basse prix");
        let en = Locale { language: "en".into(), country: "us".into() };
        assert_eq!(QueryVariation::Buy.apply(" coffee table ", &en), "coffee table buy");
        assert_eq!(QueryVariation::Bare.apply(" coffee table ", &en), "coffee table");
    }

    #[tokio::test]
    async fn stops_at_first_acceptable_image() {
        let search = ScriptedSearch::new()
            .with_results(
                "chaise acheter",
                vec![result("Logo", "https://a.example", "https://a.example/logo.png")],
            )
            .with_results(
                "chaise prix",
                vec![result("Chaise Oslo", "https://b.example/p", "https://b.example/chaise.jpg")],
            );
        let filter = ImageFilter::default();
        let locale = Locale::default();

        let hit = source_term(&search, "chaise", &params(&filter, &locale)).await.unwrap();

        assert_eq!(hit.query, "chaise prix");
        assert_eq!(hit.image_url, "https://b.example/chaise.jpg");
        assert_eq!(search.queries(), ["chaise acheter", "chaise prix"]);
    }

    #[tokio::test]
    async fn errors_skip_to_next_rung_and_exhaustion_is_none() {
        let search = ScriptedSearch::new()
            .failing_on("lampe acheter")
            .with_results(
                "lampe",
                vec![result("Icon", "https://c.example", "https://c.example/icon.svg")],
            );
        let filter = ImageFilter::default();
        let locale = Locale::default();

        assert!(source_term(&search, "lampe", &params(&filter, &locale)).await.is_none());
        assert_eq!(search.queries(), ["lampe acheter", "lampe prix", "lampe"]);
    }
}
