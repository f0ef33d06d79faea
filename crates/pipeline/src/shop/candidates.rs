//! Candidate tuples produced by the category-generation call.

use roomcraft_core::catalog::RoomKind;
use roomcraft_core::json_repair::parse_model_json;
use roomcraft_core::project::PlanItem;
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// A (category, search query, visual description, priority) tuple, prior
/// to being resolved into a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub category: String,
    pub search_term: String,
    pub visual_description: String,
    /// 1 = most important.
    pub priority: Option<u32>,
}

/// Keys the model has been seen to use for an array of candidates.
const LIST_KEYS: &[&str] = &["products", "items", "candidates", "results"];
const TERM_KEYS: &[&str] = &["searchTerm", "search_term", "searchQuery", "search_query", "query"];
const VISUAL_KEYS: &[&str] = &["visual_description", "visualDescription", "description"];

/// Read candidates from model output. Entries without a search term are
/// dropped.
pub fn parse_candidates(text: &str) -> Result<Vec<Candidate>, PipelineError> {
    let entries = match parse_model_json(text)? {
        Value::Array(entries) => entries,
        Value::Object(mut map) => LIST_KEYS
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(candidate)
        .collect())
}

fn candidate(obj: &Map<String, Value>) -> Option<Candidate> {
    let search_term = first_text(obj, TERM_KEYS)?;
    Some(Candidate {
        category: first_text(obj, &["category", "type"]).unwrap_or_else(|| search_term.clone()),
        visual_description: first_text(obj, VISUAL_KEYS).unwrap_or_default(),
        priority: obj.get("priority").and_then(priority),
        search_term,
    })
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn priority(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (n >= 1.0 && n <= f64::from(u32::MAX)).then(|| n.round() as u32)
}

/// One candidate per plan item, searched as "<item> <style>".
pub fn fallback_from_plan(plan: &[PlanItem], style: &str) -> Vec<Candidate> {
    plan.iter()
        .enumerate()
        .map(|(i, p)| Candidate {
            category: p.item.clone(),
            search_term: format!("{} {style}", p.item),
            visual_description: p.reason.clone(),
            priority: Some(i as u32 + 1),
        })
        .collect()
}

/// The room kind's priority categories, searched as "<category> <style>".
pub fn fallback_for_room(room_type: &str, style: &str) -> Vec<Candidate> {
    RoomKind::classify(room_type)
        .priority_categories()
        .iter()
        .enumerate()
        .map(|(i, category)| Candidate {
            category: (*category).to_string(),
            search_term: format!("{category} {style}"),
            visual_description: String::new(),
            priority: Some(i as u32 + 1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_field_names() {
        let text = r#"{"products": [
            {"category": "Sofa", "searchTerm": "canapé lin beige", "visual_description": "Low linen sofa", "priority": 1},
            {"type": "Lamp", "search_query": "lampadaire arc", "priority": "2"},
            {"category": "Rug"}
        ]}"#;
        let c = parse_candidates(text).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].search_term, "canapé lin beige");
        assert_eq!(c[0].priority, Some(1));
        assert_eq!(c[1].category, "Lamp");
        assert_eq!(c[1].priority, Some(2));
        assert_eq!(c[1].visual_description, "");
    }

    #[test]
    fn nonsense_priority_is_ignored() {
        let c = parse_candidates(r#"[{"searchTerm": "x", "priority": -3}]"#).unwrap();
        assert_eq!(c[0].priority, None);
        assert_eq!(c[0].category, "x");
    }

    #[test]
    fn room_fallback_follows_priority_list() {
        let c = fallback_for_room("Bedroom", "boho");
        let terms: Vec<_> = c.iter().map(|c| c.search_term.as_str()).collect();
        assert_eq!(
            terms,
            ["bed boho", "nightstand boho", "dresser boho", "lamp boho", "rug boho"]
        );
        assert_eq!(c[4].priority, Some(5));
    }
}
