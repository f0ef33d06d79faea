//! Best-effort extraction of a JSON value from generative-model text.
//!
//! Models asked to "respond in strict JSON" still wrap the payload in
//! code fences, prepend or append prose, leave trailing commas before a
//! closing bracket, or stop before closing every bracket. [`parse_model_json`]
//! undoes those failure modes in order:
//!
//! 1. strip fenced code block markers;
//! 2. locate the first `{` or `[`, which fixes the matching closer;
//! 3. scan forward with a nesting counter for that bracket kind only
//!    (brackets inside string literals are ignored) until it returns to zero;
//! 4. slice to exactly that span, closing any brackets still open when the
//!    text runs out;
//! 5. drop trailing commas that directly precede `]` or `}`;
//! 6. parse.
//!
//! When the span found at the first opening bracket does not parse (a
//! bracket in leading prose, say), opening positions after the end of that
//! span are tried in turn. Positions inside a failed span are never tried,
//! so a broken array is reported as invalid rather than answered with one
//! of its nested objects.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Matches opening (with optional language tag) and closing code fences.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("valid regex"));

/// Upper bound on the number of opening positions tried before giving up.
const MAX_START_ATTEMPTS: usize = 16;

/// Why a model response could not be turned into JSON.
#[derive(Debug, thiserror::Error)]
pub enum JsonRepairError {
    /// The text contains no `{` or `[` at all.
    #[error("No JSON object or array found in model output")]
    NoJsonFound,

    /// A candidate span was found but still failed to parse after repair.
    #[error("Model output is not valid JSON after repair: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Extract and parse the JSON object or array embedded in `text`.
pub fn parse_model_json(text: &str) -> Result<Value, JsonRepairError> {
    let clean = strip_code_fences(text);

    let mut first_err: Option<serde_json::Error> = None;
    let mut resume_at = 0;
    let mut attempts = 0;
    for (start, c) in clean.char_indices() {
        if start < resume_at || !matches!(c, '{' | '[') {
            continue;
        }
        if attempts == MAX_START_ATTEMPTS {
            break;
        }
        attempts += 1;

        let (span, end) = balanced_span(&clean, start);
        match serde_json::from_str::<Value>(&remove_trailing_commas(&span)) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_err.get_or_insert(e);
                resume_at = end;
            }
        }
    }

    match first_err {
        Some(e) => Err(JsonRepairError::Invalid(e)),
        None => Err(JsonRepairError::NoJsonFound),
    }
}

/// Parse the embedded JSON and deserialize it into `T`.
pub fn parse_model_json_as<T: DeserializeOwned>(text: &str) -> Result<T, JsonRepairError> {
    let value = parse_model_json(text)?;
    Ok(serde_json::from_value(value)?)
}

/// Remove Markdown code fence markers and trim surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Slice `text` from `start` to the position where the bracket opened at
/// `start` is closed again. Also returns the byte offset just past the
/// span in `text`.
///
/// Only the bracket kind found at `start` moves the counter. If the text
/// ends first, every bracket still open (of either kind) is closed in
/// reverse order, and an unterminated string literal is terminated.
fn balanced_span(text: &str, start: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut open_stack: Vec<u8> = Vec::new();

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => open_stack.push(b),
            b'}' | b']' => {
                open_stack.pop();
            }
            _ => {}
        }

        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                let end = start + offset + 1;
                return (text[start..end].to_string(), end);
            }
        }
    }

    // Ran out of text before the payload closed.
    let mut repaired = text[start..].trim_end().to_string();
    if in_string {
        repaired.push('"');
    }
    for b in open_stack.iter().rev() {
        repaired.push(if *b == b'{' { '}' } else { ']' });
    }
    (repaired, text.len())
}

/// Drop every comma that is followed (after optional whitespace) by `]` or
/// `}`, leaving string literals untouched.
fn remove_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut drop_at: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b',' => {
                let next = bytes[i + 1..].iter().find(|c| !c.is_ascii_whitespace());
                if matches!(next, Some(b']') | Some(b'}')) {
                    drop_at.push(i);
                }
            }
            _ => {}
        }
    }

    if drop_at.is_empty() {
        return text.to_string();
    }
    text.char_indices()
        .filter(|(i, _)| drop_at.binary_search(i).is_err())
        .map(|(_, c)| c)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    /// Wrap serialized JSON the way a chatty model would: prose, a fence,
    /// and a trailing comma before the final closer.
    fn noisy(value: &Value) -> String {
        let mut body = serde_json::to_string_pretty(value).unwrap();
        let last = body.len() - 1;
        body.insert(last, ',');
        format!("Sure! Here is the result you asked for:\n```json\n{body}\n```\nLet me know {{if}} you need more.")
    }

    #[test]
    fn round_trips_through_noise() {
        let samples = [
            json!({"plan": [{"item": "Sofa", "reason": "anchor", "placement": "left wall"}]}),
            json!([{"category": "Lamp", "searchTerm": "lampe arc laiton"}, {"category": "Rug"}]),
            json!({"text": "braces { and } and [brackets], inside strings", "n": 3}),
            json!({"quote": "she said \"hi\", }", "nested": {"deep": [1, 2, {"x": null}]}}),
            json!([]),
            json!({}),
        ];
        for value in samples {
            assert_eq!(parse_model_json(&noisy(&value)).unwrap(), value);
        }
    }

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            // Brackets, quotes, backslashes and commas inside strings.
            r#"[a-zA-Z0-9 ,:{}\[\]"\\]{0,12}"#.prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                json_object_of(inner),
            ]
        })
    }

    fn json_object_of(values: impl Strategy<Value = Value>) -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,6}", values, 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    /// The ways models dress up a JSON payload.
    fn dressed(value: &Value, style: u8) -> String {
        let compact = serde_json::to_string(value).unwrap();
        match style {
            0 => compact,
            1 => format!("```json\n{compact}\n```"),
            2 => format!("Voici la réponse : {compact} J'espère que {{cela}} aide."),
            _ => noisy(value),
        }
    }

    proptest! {
        #[test]
        fn generated_objects_round_trip(value in json_object_of(json_value()), style in 0u8..4) {
            prop_assert_eq!(parse_model_json(&dressed(&value, style)).unwrap(), value);
        }
    }

    #[test]
    fn plain_json_passes_through() {
        let v = parse_model_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn array_preferred_when_it_comes_first() {
        let v = parse_model_json(r#"[{"a": 1}, {"b": 2}]"#).unwrap();
        assert!(v.is_array());
        assert_eq!(v.as_array().unwrap().len(), 2);
    }

    #[test]
    fn trailing_prose_with_braces_is_ignored() {
        let text = r#"{"plan": []} Note: {this} is not JSON }"#;
        assert_eq!(parse_model_json(text).unwrap(), json!({"plan": []}));
    }

    #[test]
    fn nested_trailing_commas_are_removed() {
        let text = r#"{"a": [1, 2, 3,], "b": {"c": true,},}"#;
        assert_eq!(
            parse_model_json(text).unwrap(),
            json!({"a": [1, 2, 3], "b": {"c": true}})
        );
    }

    #[test]
    fn commas_inside_strings_survive() {
        let text = r#"{"a": "x, ]"}"#;
        assert_eq!(parse_model_json(text).unwrap(), json!({"a": "x, ]"}));
    }

    #[test]
    fn unbalanced_output_is_closed() {
        let text = r#"```json
{"plan": [{"item": "Lamp", "reason": "light"},"#;
        assert_eq!(
            parse_model_json(text).unwrap(),
            json!({"plan": [{"item": "Lamp", "reason": "light"}]})
        );
    }

    #[test]
    fn later_start_is_tried_when_prose_bracket_comes_first() {
        let text = r#"Reference [see below] applies. {"ok": true}"#;
        assert_eq!(parse_model_json(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn broken_array_never_yields_a_nested_object() {
        for text in [
            r#"[{"category": "Lamp"}, {"category": oops}]"#,
            r#"[{"category": "Lamp"} {"category": "Rug"}]"#,
            r#"Here: [{"item": "Sofa"}, unquoted, {"item": "Rug"}] done"#,
            r#"[{"item": "Sofa"}, {"item": "Rug"}"#,
        ] {
            match parse_model_json(text) {
                Ok(value) => assert!(value.is_array(), "{text} gave {value}"),
                Err(e) => assert_matches!(e, JsonRepairError::Invalid(_)),
            }
        }
    }

    #[test]
    fn no_brackets_yields_no_json_found() {
        assert_matches!(
            parse_model_json("I'm sorry, I can't help with that."),
            Err(JsonRepairError::NoJsonFound)
        );
        assert_matches!(parse_model_json(""), Err(JsonRepairError::NoJsonFound));
    }

    #[test]
    fn garbage_inside_brackets_yields_invalid() {
        assert_matches!(
            parse_model_json("{not: json at all}"),
            Err(JsonRepairError::Invalid(_))
        );
    }

    #[test]
    fn typed_parse() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Item {
            item: String,
        }
        let items: Vec<Item> = parse_model_json_as("```json\n[{\"item\": \"Rug\"},]\n```").unwrap();
        assert_eq!(items, vec![Item { item: "Rug".into() }]);
    }

    #[test]
    fn strip_code_fences_removes_markers() {
        assert_eq!(strip_code_fences("```json\nhello\n```"), "hello");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }
}
