//! Render stage: one multimodal model call producing the restyled room.
//!
//! The request carries the instruction text, then the room photo, then up
//! to `max_reference_images` product photos. Product photos that cannot be
//! fetched are skipped; a room photo that cannot be fetched fails the
//! render, since restyling a room the model cannot see would produce an
//! unrelated image.

use std::sync::Arc;

use futures::future::join_all;
use roomcraft_genai::{GenerateRequest, GenerateResponse, GenerativeModel, InlineImage, Modality};

use crate::brief::RoomBrief;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::{sniff_content_type, ImageFetcher};
use crate::prompts;

/// Inputs for one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub brief: RoomBrief,
    /// User vision or an instruction derived from the plan and products.
    pub instruction: String,
    pub reference_image_urls: Vec<String>,
}

/// A successful render.
#[derive(Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// The full instruction sent to the model.
    pub prompt: String,
    /// Product photos actually attached.
    pub references_used: usize,
}

impl std::fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedImage")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .field("references_used", &self.references_used)
            .finish()
    }
}

pub struct RenderStage {
    model: Arc<dyn GenerativeModel>,
    fetcher: Arc<dyn ImageFetcher>,
    config: Arc<PipelineConfig>,
}

impl RenderStage {
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

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderedImage, PipelineError> {
        let brief = &request.brief;
        let photo = match brief.image_url() {
            Some(url) => Some(self.fetch_photo(url).await?),
            None => None,
        };
        let references = self.fetch_references(&request.reference_image_urls).await;
        let references_used = references.len();

        let prompt = prompts::render_prompt(
            &brief.room_type,
            &brief.style,
            request.instruction.trim(),
            photo.is_some(),
        );
        let generate = GenerateRequest::text(prompt.clone())
            .with_images(photo)
            .with_images(references)
            .with_modalities(&[Modality::Text, Modality::Image])
            .with_timeout(self.config.render_timeout);

        tracing::info!(
            stage = "render",
            has_photo = brief.image_url().is_some(),
            references = references_used,
            "Requesting render",
        );
        let response = self.model.generate(generate).await?;
        let image = extract_image(response)?;

        Ok(RenderedImage {
            content_type: image_content_type(&image),
            bytes: image.bytes,
            prompt,
            references_used,
        })
    }

    async fn fetch_photo(&self, url: &str) -> Result<InlineImage, PipelineError> {
        let img = self
            .fetcher
            .fetch(url, self.config.original_image_timeout)
            .await
            .map_err(|e| match e {
                PipelineError::UpstreamTimeout(m) => {
                    PipelineError::UpstreamTimeout(format!("room photo: {m}"))
                }
                other => PipelineError::UpstreamUnavailable(format!("room photo: {other}")),
            })?;
        Ok(InlineImage::new(img.bytes, img.content_type))
    }

    async fn fetch_references(&self, urls: &[String]) -> Vec<InlineImage> {
        let fetches = urls
            .iter()
            .take(self.config.max_reference_images)
            .map(|url| async move {
                match self
                    .fetcher
                    .fetch(url, self.config.product_image_timeout)
                    .await
                {
                    Ok(img) => Some(InlineImage::new(img.bytes, img.content_type)),
                    Err(e) => {
                        tracing::warn!(stage = "render", url = %url, error = %e, "Skipping product reference image");
                        None
                    }
                }
            });
        join_all(fetches).await.into_iter().flatten().collect()
    }
}

/// First image part of a render response, or the reason there is none.
pub fn extract_image(response: GenerateResponse) -> Result<InlineImage, PipelineError> {
    if response.is_blocked() {
        let reason = response
            .finish_reason
            .as_ref()
            .map(|r| format!("{r:?}"))
            .unwrap_or_default();
        let text = response.text();
        let detail = if text.trim().is_empty() {
            reason
        } else {
            format!("{reason}: {}", text.trim())
        };
        return Err(PipelineError::ContentPolicyBlocked(detail));
    }

    let text = response.text();
    match response.image_parts.into_iter().next() {
        Some(image) => Ok(image),
        None => {
            let reason = if !text.trim().is_empty() {
                text.trim().to_string()
            } else if let Some(finish) = &response.finish_reason {
                format!("model finished with {finish:?} and no image")
            } else {
                "model returned no image".to_string()
            };
            Err(PipelineError::NoImageProduced(reason))
        }
    }
}

fn image_content_type(image: &InlineImage) -> String {
    if image.mime_type.starts_with("image/") {
        image.mime_type.clone()
    } else {
        sniff_content_type(&image.bytes)
            .unwrap_or("image/png")
            .to_string()
    }
}
