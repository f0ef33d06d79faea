//! Handlers for the `/studio` endpoints.
//!
//! Each runs one stage (or an assistant helper) on request data and returns
//! its output directly. Nothing is written to the project store.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use roomcraft_core::project::{PlanItem, Product};
use roomcraft_pipeline::prompts::derived_instruction;
use roomcraft_genai::InlineImage;
use roomcraft_pipeline::{
    AssistantReply, ChatTurn, PromptReview, RenderRequest, RoomAnalysis, RoomBrief, RoomContext,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ShopInput {
    #[serde(flatten)]
    pub brief: RoomBrief,
    /// An empty plan sources by room category instead.
    #[serde(default)]
    pub plan: Vec<PlanItem>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateInput {
    #[serde(flatten)]
    pub brief: RoomBrief,
    /// The user's vision. Blank derives one from `plan` and `products`.
    #[serde(default, alias = "userVision")]
    pub instruction: Option<String>,
    #[serde(default)]
    pub plan: Vec<PlanItem>,
    #[serde(default)]
    pub products: Vec<Product>,
    /// Product photos to attach. Defaults to the images of `products`.
    #[serde(default, alias = "productImageUrls")]
    pub reference_image_urls: Vec<String>,
}

/// A rendered image returned inline.
#[derive(Debug, Serialize)]
pub struct GeneratedImage {
    pub image_base64: String,
    pub content_type: String,
    pub prompt: String,
    pub references_used: usize,
}

#[derive(Debug, Deserialize)]
pub struct EnhanceInput {
    pub prompt: String,
    #[serde(default, alias = "roomType")]
    pub room_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatInput {
    #[serde(default, alias = "history")]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub context: RoomContext,
}

/// A room photo by URL, or uploaded inline as base64.
#[derive(Debug, Deserialize)]
pub struct AnalyzeInput {
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default, alias = "imageBase64")]
    pub image_base64: Option<String>,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
}

fn validate_brief(brief: &RoomBrief) -> AppResult<()> {
    if brief.room_type.trim().is_empty() {
        return Err(AppError::BadRequest("room_type must not be empty".into()));
    }
    if brief.style.trim().is_empty() {
        return Err(AppError::BadRequest("style must not be empty".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// POST /api/v1/studio/plan
///
/// Unlike a full run, an unreadable model answer is reported (502) rather
/// than degraded to an empty plan.
pub async fn plan(
    State(state): State<AppState>,
    Json(brief): Json<RoomBrief>,
) -> AppResult<Json<DataResponse<Vec<PlanItem>>>> {
    validate_brief(&brief)?;
    let plan = state.orchestrator.plan_stage().generate_plan(&brief).await?;
    Ok(Json(DataResponse { data: plan }))
}

/// POST /api/v1/studio/shop
pub async fn shop(
    State(state): State<AppState>,
    Json(input): Json<ShopInput>,
) -> AppResult<Json<DataResponse<Vec<Product>>>> {
    validate_brief(&input.brief)?;
    let products = state.orchestrator.shop_stage().run(&input.brief, &input.plan).await;
    Ok(Json(DataResponse { data: products }))
}

/// POST /api/v1/studio/generate
pub async fn generate(
    State(state): State<AppState>,
    Json(input): Json<GenerateInput>,
) -> AppResult<Json<DataResponse<GeneratedImage>>> {
    validate_brief(&input.brief)?;
    let instruction = input
        .instruction
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| derived_instruction(&input.brief.style, &input.plan, &input.products));
    let reference_image_urls = if input.reference_image_urls.is_empty() {
        input.products.iter().map(|p| p.image_url.clone()).collect()
    } else {
        input.reference_image_urls
    };

    let rendered = state
        .orchestrator
        .render_stage()
        .render(&RenderRequest {
            brief: input.brief,
            instruction,
            reference_image_urls,
        })
        .await?;

    Ok(Json(DataResponse {
        data: GeneratedImage {
            image_base64: STANDARD.encode(&rendered.bytes),
            content_type: rendered.content_type,
            prompt: rendered.prompt,
            references_used: rendered.references_used,
        },
    }))
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

/// POST /api/v1/studio/enhance-prompt
pub async fn enhance_prompt(
    State(state): State<AppState>,
    Json(input): Json<EnhanceInput>,
) -> AppResult<Json<DataResponse<PromptReview>>> {
    let room_type = input
        .room_type
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("room");
    let review = state
        .orchestrator
        .assistant()
        .enhance_prompt(&input.prompt, room_type)
        .await;
    Ok(Json(DataResponse { data: review }))
}

/// POST /api/v1/studio/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(input): Json<AnalyzeInput>,
) -> AppResult<Json<DataResponse<RoomAnalysis>>> {
    let assistant = state.orchestrator.assistant();
    let image_url = input.image_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let inline = input.image_base64.as_deref().map(str::trim).filter(|b| !b.is_empty());

    let analysis = match (image_url, inline) {
        (Some(url), None) => assistant.analyze_room(url).await?,
        (None, Some(encoded)) => {
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| AppError::BadRequest(format!("image_base64 is not valid base64: {e}")))?;
            if bytes.is_empty() {
                return Err(AppError::BadRequest("image_base64 must not be empty".into()));
            }
            let content_type = input
                .content_type
                .filter(|c| c.starts_with("image/"))
                .unwrap_or_else(|| "image/jpeg".to_string());
            assistant
                .analyze_image(InlineImage::new(bytes, content_type))
                .await?
        }
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "provide either image_url or image_base64, not both".into(),
            ))
        }
        (None, None) => {
            return Err(AppError::BadRequest("No image URL provided".into()));
        }
    };
    Ok(Json(DataResponse { data: analysis }))
}

/// POST /api/v1/studio/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(input): Json<ChatInput>,
) -> AppResult<Json<DataResponse<AssistantReply>>> {
    let reply = state
        .orchestrator
        .assistant()
        .reply(&input.context, &input.messages)
        .await;
    Ok(Json(DataResponse { data: reply }))
}
