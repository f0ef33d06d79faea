//! Prompt enhancement, the design assistant chat and room analysis.
//!
//! Enhancement and chat always answer: malformed model output and upstream
//! failures turn into deterministic fallbacks rather than errors. Analysis
//! reports an unreadable photo or a failed model call, and falls back only
//! when the model's answer cannot be parsed.

use std::sync::Arc;

use roomcraft_core::json_repair::{parse_model_json, strip_code_fences};
use roomcraft_genai::{GenerateRequest, GenerativeModel, InlineImage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::ImageFetcher;
use crate::prompts::{self, ChatTurn, RoomContext};

/// Shorter requests are rejected without calling the model.
pub const MIN_PROMPT_CHARS: usize = 10;

/// Suggestions returned for a request that is too short.
const SHORT_PROMPT_SUGGESTIONS: &[&str] = &[
    "Add colors (e.g. terracotta tones, petrol blue)",
    "Mention materials (light wood, marble, concrete)",
    "Describe the mood you want (warm, minimalist)",
];

const APOLOGY: &str = "Sorry, I'm having technical difficulties right now. Please try again in a moment.";

/// Review of a user's free-text design request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptReview {
    pub valid: bool,
    pub score: Option<u8>,
    pub missing_elements: Vec<String>,
    pub enhanced_prompt: Option<String>,
    pub suggestions: Vec<String>,
    pub original_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantAction {
    Chat,
    GenerateImage,
}

/// One assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub action: AssistantAction,
    pub message: String,
    /// Set when `action` is `generate_image`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl AssistantReply {
    pub fn chat(message: impl Into<String>) -> Self {
        Self {
            action: AssistantAction::Chat,
            message: message.into(),
            image_prompt: None,
        }
    }
}

/// First look at a room photo: what it is and what could be done with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnalysis {
    pub room_type: String,
    pub current_style: String,
    pub condition: String,
    /// At most three renovation ideas.
    pub proposals: Vec<String>,
    /// Free-text price range, e.g. "5 000 - 8 000 EUR".
    pub estimated_cost: String,
}

impl RoomAnalysis {
    /// Answer used when the model's analysis cannot be read.
    pub fn fallback() -> Self {
        Self {
            room_type: "room".into(),
            current_style: "unknown".into(),
            condition: "unknown".into(),
            proposals: FALLBACK_PROPOSALS.iter().map(|p| p.to_string()).collect(),
            estimated_cost: "unknown".into(),
        }
    }

    /// The chat context this analysis describes.
    pub fn context(&self) -> RoomContext {
        RoomContext {
            room_type: Some(self.room_type.clone()),
            current_style: Some(self.current_style.clone()),
            condition: Some(self.condition.clone()),
        }
    }
}

const MAX_PROPOSALS: usize = 3;

const FALLBACK_PROPOSALS: &[&str] = &[
    "Refresh the walls with a lighter, warmer paint",
    "Replace dated light fixtures with layered lighting",
    "Declutter and add a few statement furniture pieces",
];

pub struct Assistant {
    model: Arc<dyn GenerativeModel>,
    fetcher: Arc<dyn ImageFetcher>,
    config: Arc<PipelineConfig>,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        fetcher: Arc<dyn ImageFetcher>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            model,
            fetcher,
            config,
        }
    }

    /// Analyze the room photo at `image_url`.
    pub async fn analyze_room(&self, image_url: &str) -> Result<RoomAnalysis, PipelineError> {
        let photo = self
            .fetcher
            .fetch(image_url, self.config.original_image_timeout)
            .await?;
        self.analyze_image(InlineImage::new(photo.bytes, photo.content_type))
            .await
    }

    /// Analyze an uploaded room photo.
    pub async fn analyze_image(&self, photo: InlineImage) -> Result<RoomAnalysis, PipelineError> {
        let request = GenerateRequest::text(prompts::analyze_room_prompt())
            .with_image(photo)
            .with_timeout(self.config.model_timeout);
        let response = self.model.generate(request).await?;
        let analysis = parse_analysis(&response.text());
        tracing::info!(room_type = %analysis.room_type, "Room analyzed");
        Ok(analysis)
    }

    pub async fn enhance_prompt(&self, user_prompt: &str, room_type: &str) -> PromptReview {
        let user_prompt = user_prompt.trim();
        if user_prompt.chars().count() < MIN_PROMPT_CHARS {
            return PromptReview {
                valid: false,
                score: None,
                missing_elements: Vec::new(),
                enhanced_prompt: None,
                suggestions: SHORT_PROMPT_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
                original_prompt: user_prompt.to_string(),
                error: Some("The description is too short".into()),
            };
        }

        let request = GenerateRequest::text(prompts::enhance_prompt(user_prompt, room_type))
            .with_timeout(self.config.model_timeout);
        let text = match self.model.generate(request).await {
            Ok(response) => response.text(),
            Err(e) => {
                tracing::warn!(error = %e, "Prompt enhancement failed, returning the original");
                return PromptReview {
                    valid: true,
                    score: None,
                    missing_elements: Vec::new(),
                    enhanced_prompt: Some(format!(
                        "Interior design renovation. {user_prompt}. High quality, photorealistic."
                    )),
                    suggestions: Vec::new(),
                    original_prompt: user_prompt.to_string(),
                    error: Some("Enhancement failed, using original".into()),
                };
            }
        };

        match parse_model_json(&text) {
            Ok(Value::Object(map)) => review_from_model(&map, user_prompt, room_type),
            Ok(_) | Err(_) => {
                tracing::warn!("Enhancement output unreadable, synthesizing review");
                synthesized_review(user_prompt, room_type)
            }
        }
    }

    /// Answer the last turn of `history`. An empty history gets a plain
    /// greeting without a model call.
    pub async fn reply(&self, context: &RoomContext, history: &[ChatTurn]) -> AssistantReply {
        if history.is_empty() {
            return AssistantReply::chat("How can I help with your room?");
        }
        let request = GenerateRequest::text(prompts::assistant_prompt(context, history))
            .with_timeout(self.config.model_timeout);
        match self.model.generate(request).await {
            Ok(response) => parse_reply(&response.text()),
            Err(e) => {
                tracing::warn!(error = %e, "Assistant call failed");
                AssistantReply::chat(APOLOGY)
            }
        }
    }
}

fn review_from_model(map: &serde_json::Map<String, Value>, user_prompt: &str, room_type: &str) -> PromptReview {
    let fallback = synthesized_review(user_prompt, room_type);
    let score = map
        .get("score")
        .and_then(Value::as_f64)
        .map(|s| s.clamp(1.0, 10.0).round() as u8);
    let is_complete = map.get("isComplete").and_then(Value::as_bool).unwrap_or(false);
    let strings = |key: &str| -> Vec<String> {
        map.get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    };
    let enhanced = map
        .get("enhancedPrompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or(fallback.enhanced_prompt);

    PromptReview {
        valid: is_complete || score.is_some_and(|s| s >= 5),
        score,
        missing_elements: strings("missingElements"),
        enhanced_prompt: enhanced,
        suggestions: strings("suggestions"),
        original_prompt: user_prompt.to_string(),
        error: None,
    }
}

/// Deterministic review used when the model's answer cannot be read.
pub fn synthesized_review(user_prompt: &str, room_type: &str) -> PromptReview {
    let len = user_prompt.chars().count();
    let score = (len / 20).min(10) as u8;
    let is_complete = len > 50;
    let room = if room_type.trim().is_empty() { "room" } else { room_type.trim() };
    PromptReview {
        valid: is_complete || score >= 5,
        score: Some(score),
        missing_elements: Vec::new(),
        enhanced_prompt: Some(format!(
            "Interior design renovation for a {room}. {user_prompt}. Professional interior \
             photography, photorealistic, high quality, natural lighting."
        )),
        suggestions: Vec::new(),
        original_prompt: user_prompt.to_string(),
        error: None,
    }
}

/// Read an analysis from model output. Missing or blank fields take their
/// fallback value; an answer that is not a JSON object is the fallback.
pub fn parse_analysis(text: &str) -> RoomAnalysis {
    let fallback = RoomAnalysis::fallback();
    let map = match parse_model_json(text) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::warn!("Room analysis unreadable, using fallback");
            return fallback;
        }
    };
    let text_field = |key: &str, default: String| {
        map.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(default)
    };
    let proposals: Vec<String> = map
        .get("proposals")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .take(MAX_PROPOSALS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    RoomAnalysis {
        room_type: text_field("roomType", fallback.room_type),
        current_style: text_field("currentStyle", fallback.current_style),
        condition: text_field("condition", fallback.condition),
        proposals: if proposals.is_empty() {
            fallback.proposals
        } else {
            proposals
        },
        estimated_cost: text_field("estimatedCost", fallback.estimated_cost),
    }
}

/// Read an assistant turn from model output. Anything unreadable becomes a
/// chat message carrying the model's text.
pub fn parse_reply(text: &str) -> AssistantReply {
    let parsed = parse_model_json(text)
        .ok()
        .and_then(|v| serde_json::from_value::<AssistantReply>(v).ok());
    match parsed {
        Some(reply) if reply.action == AssistantAction::GenerateImage => {
            match reply.image_prompt.as_deref().map(str::trim) {
                Some(p) if !p.is_empty() => reply,
                _ => AssistantReply::chat(reply.message),
            }
        }
        Some(reply) => AssistantReply::chat(reply.message),
        None => {
            let plain = strip_code_fences(text);
            if plain.is_empty() {
                AssistantReply::chat(APOLOGY)
            } else {
                AssistantReply::chat(plain)
            }
        }
    }
}
