//! Mapping of a Custom Search item's `pagemap` into typed fields.
//!
//! `pagemap` is an open-ended document: each key holds an array of objects
//! whose fields depend on the markup the crawler found on the page. Only
//! the first object of each kind is consulted.

use serde_json::Value;

use crate::types::PriceHints;

/// `(pagemap key, field)` pairs that may hold a product image, in
/// preference order.
const IMAGE_FIELDS: &[(&str, &str)] = &[
    ("product", "image"),
    ("cse_image", "src"),
    ("metatags", "og:image"),
    ("cse_thumbnail", "src"),
];

/// First non-empty string at `pagemap[kind][0][field]`.
pub fn first_str<'a>(pagemap: &'a Value, kind: &str, field: &str) -> Option<&'a str> {
    pagemap
        .get(kind)?
        .as_array()?
        .first()?
        .get(field)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Candidate image URLs in preference order, deduplicated.
pub fn image_candidates(pagemap: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (kind, field) in IMAGE_FIELDS {
        if let Some(url) = first_str(pagemap, kind, field) {
            if !out.iter().any(|u| u == url) {
                out.push(url.to_string());
            }
        }
    }
    out
}

/// Price-related fields from product, offer, and metatag entries.
pub fn price_hints(pagemap: &Value) -> PriceHints {
    let owned = |kind: &str, field: &str| first_str(pagemap, kind, field).map(str::to_string);
    PriceHints {
        product_price: owned("product", "price").or_else(|| owned("product", "lowprice")),
        product_currency: owned("product", "pricecurrency").or_else(|| owned("product", "currency")),
        offer_price: owned("offer", "price").or_else(|| owned("offer", "lowprice")),
        offer_currency: owned("offer", "pricecurrency"),
        meta_price: owned("metatags", "product:price:amount")
            .or_else(|| owned("metatags", "og:price:amount")),
        meta_currency: owned("metatags", "product:price:currency")
            .or_else(|| owned("metatags", "og:price:currency")),
    }
}
