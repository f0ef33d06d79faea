//! Plan stage: one model call turning the room photo and brief into an
//! ordered furnishing plan.

use std::sync::Arc;

use roomcraft_core::json_repair::parse_model_json;
use roomcraft_core::project::PlanItem;
use roomcraft_genai::{GenerateRequest, GenerativeModel, InlineImage};
use serde_json::Value;

use crate::brief::RoomBrief;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::ImageFetcher;
use crate::prompts;

pub struct PlanStage {
    model: Arc<dyn GenerativeModel>,
    fetcher: Arc<dyn ImageFetcher>,
    config: Arc<PipelineConfig>,
}

impl PlanStage {
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

    /// Produce the plan, absorbing every failure into an empty plan.
    pub async fn run(&self, brief: &RoomBrief) -> Vec<PlanItem> {
        match self.generate_plan(brief).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(stage = "plan", error = %e, "Plan generation failed, continuing without a plan");
                Vec::new()
            }
        }
    }

    /// Produce the plan, surfacing model and parse failures.
    pub async fn generate_plan(&self, brief: &RoomBrief) -> Result<Vec<PlanItem>, PipelineError> {
        let photo = self.fetch_photo(brief).await;
        let instruction = prompts::plan_prompt(
            &brief.room_type,
            &brief.style,
            brief.budget,
            photo.is_some(),
        );

        let mut request = GenerateRequest::text(instruction).with_timeout(self.config.model_timeout);
        if let Some(photo) = photo {
            request = request.with_image(photo);
        }

        let response = self.model.generate(request).await?;
        let plan = parse_plan(&response.text())?;
        tracing::info!(stage = "plan", items = plan.len(), "Plan generated");
        Ok(plan)
    }

    /// The room photo, or `None` when there is none or it cannot be read.
    async fn fetch_photo(&self, brief: &RoomBrief) -> Option<InlineImage> {
        let url = brief.image_url()?;
        match self
            .fetcher
            .fetch(url, self.config.original_image_timeout)
            .await
        {
            Ok(img) => Some(InlineImage::new(img.bytes, img.content_type)),
            Err(e) => {
                tracing::warn!(stage = "plan", url, error = %e, "Room photo unavailable, planning from text only");
                None
            }
        }
    }
}

/// Read a plan from model output: a bare array, or an object with a `plan`
/// array. Any other JSON shape is an empty plan; entries without an item
/// name are dropped.
pub fn parse_plan(text: &str) -> Result<Vec<PlanItem>, PipelineError> {
    let value = parse_model_json(text)?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("plan") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(entries.into_iter().filter_map(plan_item).collect())
}

fn plan_item(entry: Value) -> Option<PlanItem> {
    let item = match entry {
        Value::String(name) => PlanItem {
            item: name,
            reason: String::new(),
            placement: String::new(),
        },
        other => serde_json::from_value(other).ok()?,
    };
    let name = item.item.trim();
    if name.is_empty() {
        return None;
    }
    Some(PlanItem {
        item: name.to_string(),
        reason: item.reason.trim().to_string(),
        placement: item.placement.trim().to_string(),
    })
}
