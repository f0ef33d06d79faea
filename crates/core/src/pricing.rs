//! Price text heuristics.
//!
//! Structured search metadata and free-text snippets write prices in many
//! shapes (`"129,99 €"`, `"1 299 EUR"`, `"$1,299.00"`, `"49.9"`). These
//! helpers turn them into an amount plus an ISO currency code. They are
//! heuristics: a value that cannot be read confidently yields `None`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A number followed by a currency symbol or code, e.g. `"1 299,99 €"`.
pub const SNIPPET_PRICE_PATTERN: &str = r"(?i)(\d{1,3}(?:[ \x{A0}\x{202F}.,]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?)\s?(€|\$|£|(?:eur|usd|gbp)\b)";

static SNIPPET_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SNIPPET_PRICE_PATTERN).expect("valid regex"));

/// First run of digits and separators inside a structured value.
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d \x{A0}\x{202F}.,]*").expect("valid regex"));

/// An extracted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub amount: f64,
    /// ISO 4217 code when known.
    pub currency: Option<String>,
}

/// Map a currency symbol or code onto its ISO 4217 code.
pub fn normalize_currency(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed {
        "€" => return Some("EUR".into()),
        "$" => return Some("USD".into()),
        "£" => return Some("GBP".into()),
        _ => {}
    }
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(trimmed.to_ascii_uppercase())
    } else {
        None
    }
}

/// Parse a bare numeric string that may use `,` or `.` as decimal or
/// thousands separators and spaces as thousands separators.
///
/// The last separator is treated as decimal when it is followed by one or
/// two digits, otherwise every separator is a thousands separator.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let compact: String = raw
        .trim()
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{202F}')
        .collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let normalized = match compact.rfind(['.', ',']) {
        Some(pos) => {
            let decimals = compact.len() - pos - 1;
            let (int_part, frac_part) = compact.split_at(pos);
            let int_digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
            if (1..=2).contains(&decimals) {
                format!("{int_digits}.{}", &frac_part[1..])
            } else {
                format!("{int_digits}{}", &frac_part[1..])
            }
        }
        None => compact,
    };

    let amount: f64 = normalized.parse().ok()?;
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

/// Read a price from a structured metadata value such as `"129.00"` or
/// `"EUR 129,00"`.
pub fn parse_structured_price(raw: &str) -> Option<f64> {
    let m = NUMBER_RE.find(raw)?;
    parse_amount(m.as_str())
}

/// Find the first `<number><currency>` occurrence in free text.
pub fn price_from_snippet(text: &str) -> Option<PriceQuote> {
    SNIPPET_PRICE_RE.captures_iter(text).find_map(|caps| {
        let amount = parse_amount(caps.get(1)?.as_str())?;
        let currency = normalize_currency(caps.get(2)?.as_str());
        Some(PriceQuote { amount, currency })
    })
}
