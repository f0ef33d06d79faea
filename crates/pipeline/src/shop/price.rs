//! Price extraction ladder.
//!
//! Strategies are tried in [`PRICE_LADDER`] order and the first one that
//! reads a number wins.

use roomcraft_core::pricing::{normalize_currency, parse_structured_price, price_from_snippet, PriceQuote};
use roomcraft_search::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStrategy {
    /// `pagemap.product[0].price`
    StructuredProduct,
    /// `pagemap.offer[0].price`
    StructuredOffer,
    /// `product:price:amount` style metatags.
    CurrencyMetatag,
    /// A number followed by a currency symbol in the snippet.
    SnippetRegex,
}

pub const PRICE_LADDER: [PriceStrategy; 4] = [
    PriceStrategy::StructuredProduct,
    PriceStrategy::StructuredOffer,
    PriceStrategy::CurrencyMetatag,
    PriceStrategy::SnippetRegex,
];

impl PriceStrategy {
    pub fn extract(self, result: &SearchResult) -> Option<PriceQuote> {
        let hints = &result.price_hints;
        match self {
            Self::StructuredProduct => {
                structured(hints.product_price.as_deref(), hints.product_currency.as_deref())
            }
            Self::StructuredOffer => {
                structured(hints.offer_price.as_deref(), hints.offer_currency.as_deref())
            }
            Self::CurrencyMetatag => {
                structured(hints.meta_price.as_deref(), hints.meta_currency.as_deref())
            }
            Self::SnippetRegex => price_from_snippet(&result.snippet),
        }
    }
}

fn structured(price: Option<&str>, currency: Option<&str>) -> Option<PriceQuote> {
    let amount = parse_structured_price(price?)?;
    Some(PriceQuote {
        amount,
        currency: currency.and_then(normalize_currency),
    })
}

/// Price of a search hit, or `None` when no strategy is confident.
pub fn extract_price(result: &SearchResult) -> Option<PriceQuote> {
    PRICE_LADDER.iter().find_map(|s| s.extract(result))
}

#[cfg(test)]
mod tests {
    use roomcraft_search::PriceHints;

    use super::*;

    fn hit(hints: PriceHints, snippet: &str) -> SearchResult {
        SearchResult {
            snippet: snippet.into(),
            price_hints: hints,
            ..Default::default()
        }
    }

    #[test]
    fn structured_data_beats_snippet() {
        let r = hit(
            PriceHints {
                offer_price: Some("349.00".into()),
                offer_currency: Some("EUR".into()),
                ..Default::default()
            },
            "Was 499 €",
        );
        assert_eq!(
            extract_price(&r),
            Some(PriceQuote { amount: 349.0, currency: Some("EUR".into()) })
        );
    }

    #[test]
    fn product_price_comes_first() {
        let r = hit(
            PriceHints {
                product_price: Some("89,90".into()),
                offer_price: Some("120".into()),
                ..Default::default()
            },
            "",
        );
        assert_eq!(extract_price(&r).map(|p| p.amount), Some(89.9));
    }

    #[test]
    fn falls_through_to_snippet_then_none() {
        let r = hit(
            PriceHints {
                meta_price: Some("n/a".into()),
                ..Default::default()
            },
            "Fauteuil en velours, 1 299,99 € livraison offerte",
        );
        let p = extract_price(&r).unwrap();
        assert_eq!(p.amount, 1299.99);
        assert_eq!(p.currency.as_deref(), Some("EUR"));

        assert_eq!(extract_price(&hit(PriceHints::default(), "Free delivery")), None);
    }
}
