//! Provider-neutral request/response types for a multimodal model call.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::GenAiError;

/// Output kinds a request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
        }
    }
}

/// Binary image attached to a request or returned in a response.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl InlineImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One model call: an instruction plus optional images.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub instruction: String,
    pub images: Vec<InlineImage>,
    pub modalities: Vec<Modality>,
    /// Overrides the client default when set.
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    /// A text-only request expecting text back.
    pub fn text(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            images: Vec::new(),
            modalities: vec![Modality::Text],
            timeout: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = InlineImage>) -> Self {
        self.images.extend(images);
        self
    }

    pub fn with_modalities(mut self, modalities: &[Modality]) -> Self {
        self.modalities = modalities.to_vec();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn wants_image(&self) -> bool {
        self.modalities.contains(&Modality::Image)
    }
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    /// Refused by a content-policy filter.
    Safety,
    Recitation,
    Blocklist,
    ProhibitedContent,
    ImageSafety,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::MaxTokens,
            "SAFETY" => Self::Safety,
            "RECITATION" => Self::Recitation,
            "BLOCKLIST" => Self::Blocklist,
            "PROHIBITED_CONTENT" => Self::ProhibitedContent,
            "IMAGE_SAFETY" => Self::ImageSafety,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the output was withheld by a content policy.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            Self::Safety
                | Self::Recitation
                | Self::Blocklist
                | Self::ProhibitedContent
                | Self::ImageSafety
        )
    }
}

/// Text and image parts of a model answer, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text_parts: Vec<String>,
    pub image_parts: Vec<InlineImage>,
    pub finish_reason: Option<FinishReason>,
}

impl GenerateResponse {
    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.text_parts.join("\n")
    }

    pub fn first_image(&self) -> Option<&InlineImage> {
        self.image_parts.first()
    }

    pub fn is_blocked(&self) -> bool {
        self.finish_reason.as_ref().is_some_and(FinishReason::is_blocked)
    }
}

/// A multimodal generative model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GenAiError>;
}
