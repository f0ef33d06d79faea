//! Project document model (the unit of work and persistence).
//!
//! A [`Project`] is the sole root document; [`PlanItem`], [`Product`] and
//! [`Generation`] are value objects embedded in it and have no lifecycle
//! of their own.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::types::{new_id, ProjectId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of the free-text room type and style tags.
pub const MAX_TAG_LENGTH: usize = 100;

/// Maximum length of a project display name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Sentinel accepted on input for an unbounded budget.
pub const BUDGET_UNLIMITED: &str = "unlimited";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Pipeline status of a project.
///
/// `Pending` and `Generating` are transient; `Completed` and `Error` are
/// terminal. Transitions only move forward (see [`can_transition_to`]).
///
/// [`can_transition_to`]: ProjectStatus::can_transition_to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    Generating,
    Completed,
    Error,
}

impl ProjectStatus {
    /// Persisted name of the status.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Parse a persisted status name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(CoreError::Validation(format!(
                "Unknown project status '{other}'"
            ))),
        }
    }

    /// Whether no further automatic transition occurs from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether moving from `self` to `next` is a legal, monotonic step.
    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Generating)
                | (Self::Generating, Self::Completed)
                | (Self::Generating, Self::Error)
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Target spend for furnishing a room.
///
/// Serialized as a bare number or the string `"unlimited"`. On input a
/// numeric string such as `"2000"` is also accepted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Budget {
    Amount(f64),
    #[default]
    Unlimited,
}

impl Budget {
    /// Parse a budget from its textual form.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(BUDGET_UNLIMITED) {
            return Ok(Self::Unlimited);
        }
        let amount: f64 = trimmed
            .parse()
            .map_err(|_| CoreError::Validation(format!("Invalid budget '{raw}'")))?;
        Self::amount(amount)
    }

    /// Build a bounded budget, rejecting non-positive or non-finite values.
    pub fn amount(amount: f64) -> Result<Self, CoreError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Budget must be a positive amount (got {amount})"
            )));
        }
        Ok(Self::Amount(amount))
    }

    /// The bounded amount, if any.
    pub fn as_amount(self) -> Option<f64> {
        match self {
            Self::Amount(a) => Some(a),
            Self::Unlimited => None,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(a) => write!(f, "{a}"),
            Self::Unlimited => f.write_str(BUDGET_UNLIMITED),
        }
    }
}

impl Serialize for Budget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Amount(a) => serializer.serialize_f64(*a),
            Self::Unlimited => serializer.serialize_str(BUDGET_UNLIMITED),
        }
    }
}

impl<'de> Deserialize<'de> for Budget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Self::Unlimited),
            Some(Raw::Number(n)) => Self::amount(n).map_err(serde::de::Error::custom),
            Some(Raw::Text(s)) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Value objects
// ---------------------------------------------------------------------------

/// One furnishing recommendation. Identified only by its position in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    /// Generic item name, e.g. "Corner Sofa".
    #[serde(alias = "name")]
    pub item: String,
    /// Why this item fits the space and style.
    #[serde(default, alias = "rationale")]
    pub reason: String,
    /// Suggested placement, e.g. "Left wall".
    #[serde(default)]
    pub placement: String,
}

/// A sourced, shoppable candidate that survived filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// Name cleaned from the search-result title.
    pub name: String,
    pub category: String,
    pub description: String,
    /// Longer visual description used as a generation hint.
    pub visual_description: String,
    /// The exact query variation that produced this product.
    pub search_query: String,
    pub source_image_url: String,
    /// Re-hosted copy, when persistence succeeded.
    pub persisted_image_url: Option<String>,
    /// Canonical image: the persisted copy if available, else the source.
    pub image_url: String,
    pub product_url: String,
    /// Whether the product page answered a reachability check.
    pub verified: bool,
    pub price: Option<f64>,
    pub currency: Option<String>,
    /// Hostname of the product page.
    pub source: Option<String>,
    /// 1 = most important.
    pub priority: Option<u32>,
    pub fetched_at: Timestamp,
}

impl Product {
    /// Sort key: ascending priority, unspecified last.
    pub fn priority_rank(&self) -> u32 {
        self.priority.unwrap_or(u32::MAX)
    }
}

/// Sort products ascending by priority; unspecified priorities go last and
/// ties keep their input order.
pub fn sort_by_priority(products: &mut [Product]) {
    products.sort_by_key(Product::priority_rank);
}

/// One rendered output. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub id: String,
    pub image_url: String,
    /// Instruction that produced the image.
    pub prompt: String,
    pub created_at: Timestamp,
}

impl Generation {
    /// Create a generation record with a fresh id.
    pub fn new(id: impl Into<String>, image_url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_url: image_url.into(),
            prompt: prompt.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// The project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: String,
    pub name: String,
    pub original_image_url: Option<String>,
    pub room_type: String,
    pub style: String,
    pub budget: Budget,
    pub status: ProjectStatus,
    pub plan: Option<Vec<PlanItem>>,
    pub products: Option<Vec<Product>>,
    #[serde(default)]
    pub generations: Vec<Generation>,
    /// Set only in the `error` state.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Project {
    /// Most recent generation, if any.
    pub fn latest_generation(&self) -> Option<&Generation> {
        self.generations.last()
    }

    /// Whether a caller-initiated generation may be appended right now.
    ///
    /// Only completed projects accept new generations: pending/generating
    /// ones still belong to the orchestrator and errored ones are frozen.
    pub fn accepts_generations(&self) -> bool {
        self.status == ProjectStatus::Completed
    }

    /// Image URLs of the sourced products, in priority order.
    pub fn product_image_urls(&self) -> Vec<String> {
        self.products
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| p.image_url.clone())
            .collect()
    }
}

/// DTO for `createProject`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub owner_id: String,
    pub name: Option<String>,
    pub original_image_url: Option<String>,
    pub room_type: String,
    pub style: String,
    #[serde(default)]
    pub budget: Budget,
}

impl NewProject {
    /// Validate the request fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.owner_id.trim().is_empty() {
            return Err(CoreError::Validation("owner_id must not be empty".into()));
        }
        validate_tag("room_type", &self.room_type)?;
        validate_tag("style", &self.style)?;
        if let Some(name) = &self.name {
            if name.len() > MAX_NAME_LENGTH {
                return Err(CoreError::Validation(format!(
                    "name exceeds maximum length of {MAX_NAME_LENGTH} characters"
                )));
            }
        }
        if let Some(image) = self.original_image_url.as_deref().filter(|u| !u.trim().is_empty()) {
            validate_http_url("original_image_url", image)?;
        }
        Ok(())
    }

    /// Build the pending project document with a fresh id.
    pub fn into_project(self) -> Project {
        let now = chrono::Utc::now();
        let room_type = self.room_type.trim().to_string();
        let style = self.style.trim().to_string();
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{style} {room_type}"));

        Project {
            id: new_id(),
            owner_id: self.owner_id,
            name,
            original_image_url: self.original_image_url.filter(|u| !u.trim().is_empty()),
            room_type,
            style,
            budget: self.budget,
            status: ProjectStatus::Pending,
            plan: None,
            products: None,
            generations: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Validate a free-text tag such as a room type or style.
pub fn validate_tag(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_TAG_LENGTH {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {MAX_TAG_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate that `value` is an absolute http(s) URL.
pub fn validate_http_url(field: &str, value: &str) -> Result<(), CoreError> {
    match url::Url::parse(value) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn new_project() -> NewProject {
        NewProject {
            owner_id: "user-1".into(),
            name: None,
            original_image_url: Some("https://cdn.example/room.jpg".into()),
            room_type: "kitchen".into(),
            style: "japandi".into(),
            budget: Budget::Amount(2000.0),
        }
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use ProjectStatus::*;
        assert!(Pending.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Completed));
        assert!(Generating.can_transition_to(Error));

        assert!(!Generating.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Generating));
        assert!(!Error.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(ProjectStatus::Completed.is_terminal());
        assert!(ProjectStatus::Error.is_terminal());
        assert!(!ProjectStatus::Pending.is_terminal());
        assert!(!ProjectStatus::Generating.is_terminal());
    }

    #[test]
    fn status_name_round_trip() {
        for status in [
            ProjectStatus::Pending,
            ProjectStatus::Generating,
            ProjectStatus::Completed,
            ProjectStatus::Error,
        ] {
            assert_eq!(ProjectStatus::from_name(status.name()).unwrap(), status);
        }
        assert!(ProjectStatus::from_name("paused").is_err());
    }

    #[test]
    fn budget_accepts_numeric_string_and_unlimited() {
        let b: Budget = serde_json::from_str("\"2000\"").unwrap();
        assert_eq!(b, Budget::Amount(2000.0));

        let b: Budget = serde_json::from_str("1500.5").unwrap();
        assert_eq!(b, Budget::Amount(1500.5));

        let b: Budget = serde_json::from_str("\"Unlimited\"").unwrap();
        assert_eq!(b, Budget::Unlimited);

        let b: Budget = serde_json::from_str("null").unwrap();
        assert_eq!(b, Budget::Unlimited);
    }

    #[test]
    fn budget_rejects_non_positive() {
        assert!(serde_json::from_str::<Budget>("-5").is_err());
        assert!(serde_json::from_str::<Budget>("\"abc\"").is_err());
        assert!(Budget::parse("0").is_err());
    }

    #[test]
    fn budget_serializes_as_number_or_sentinel() {
        assert_eq!(serde_json::to_string(&Budget::Amount(2000.0)).unwrap(), "2000.0");
        assert_eq!(
            serde_json::to_string(&Budget::Unlimited).unwrap(),
            "\"unlimited\""
        );
    }

    #[test]
    fn plan_item_accepts_aliases() {
        let item: PlanItem =
            serde_json::from_str(r#"{"name": "Rug", "rationale": "warmth"}"#).unwrap();
        assert_eq!(item.item, "Rug");
        assert_eq!(item.reason, "warmth");
        assert_eq!(item.placement, "");
    }

    #[test]
    fn new_project_validation() {
        assert!(new_project().validate().is_ok());

        let mut p = new_project();
        p.owner_id = "  ".into();
        assert!(p.validate().is_err());

        let mut p = new_project();
        p.room_type = String::new();
        assert!(p.validate().is_err());

        let mut p = new_project();
        p.original_image_url = Some("ftp://host/file.jpg".into());
        assert!(p.validate().is_err());

        let mut p = new_project();
        p.style = "x".repeat(MAX_TAG_LENGTH + 1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn into_project_starts_pending_with_default_name() {
        let project = new_project().into_project();
        assert_eq!(project.status, ProjectStatus::Pending);
        assert_eq!(project.name, "japandi kitchen");
        assert!(project.plan.is_none());
        assert!(project.products.is_none());
        assert!(project.generations.is_empty());
        assert!(project.error.is_none());
        assert!(project.completed_at.is_none());
    }

    #[test]
    fn blank_image_url_is_dropped() {
        let mut p = new_project();
        p.original_image_url = Some("   ".into());
        assert!(p.into_project().original_image_url.is_none());
    }

    #[test]
    fn project_json_round_trip() {
        let project = new_project().into_project();
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["status"], "pending");
        let back: Project = serde_json::from_value(json).unwrap();
        assert_eq!(back, project);
    }

    fn product(priority: Option<u32>, name: &str) -> Product {
        Product {
            id: name.into(),
            name: name.into(),
            category: "c".into(),
            description: String::new(),
            visual_description: String::new(),
            search_query: String::new(),
            source_image_url: "https://x/a.jpg".into(),
            persisted_image_url: None,
            image_url: "https://x/a.jpg".into(),
            product_url: "https://x/p".into(),
            verified: false,
            price: None,
            currency: None,
            source: None,
            priority,
            fetched_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn sort_by_priority_puts_unspecified_last() {
        let mut products = vec![
            product(None, "none"),
            product(Some(3), "three"),
            product(Some(1), "one"),
        ];
        sort_by_priority(&mut products);
        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["one", "three", "none"]);
    }
}
