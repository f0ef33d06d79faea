//! REST client for the Gemini `generateContent` endpoint.
//!
//! Requests go to `{api_base}/models/{model}:generateContent`, with the API
//! key in the `x-goog-api-key` header so it stays out of URLs and logs. The
//! text model serves text-only calls and the image model serves any call
//! that asks for the `IMAGE` modality.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::GenAiError;
use crate::model::{FinishReason, GenerateRequest, GenerateResponse, GenerativeModel, InlineImage};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiClient`].
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    /// Applied when a request carries no timeout of its own.
    pub default_timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.into(),
            text_model: DEFAULT_TEXT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var              | Default                                              |
    /// |----------------------|------------------------------------------------------|
    /// | `GEMINI_API_KEY`     | required                                             |
    /// | `GEMINI_API_BASE`    | `https://generativelanguage.googleapis.com/v1beta`   |
    /// | `GEMINI_TEXT_MODEL`  | `gemini-2.0-flash`                                   |
    /// | `GEMINI_IMAGE_MODEL` | `gemini-3-pro-image-preview`                         |
    pub fn from_env() -> Result<Self, GenAiError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(GenAiError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(base) = std::env::var("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("GEMINI_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Ok(model) = std::env::var("GEMINI_IMAGE_MODEL") {
            config.image_model = model;
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let model = model.trim();
        let path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{path}:generateContent", self.config.api_base)
    }

    fn build_body(request: &GenerateRequest) -> Value {
        let mut parts = vec![json!({ "text": request.instruction })];
        for image in &request.images {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": BASE64.encode(&image.bytes),
                }
            }));
        }
        let modalities: Vec<&str> = request.modalities.iter().map(|m| m.as_str()).collect();
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": modalities },
        })
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise return
    /// [`GenAiError::Api`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GenAiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenAiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenAiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GenAiError> {
        let model = if request.wants_image() {
            &self.config.image_model
        } else {
            &self.config.text_model
        };
        let endpoint = self.endpoint_for_model(model);
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);

        tracing::debug!(
            model = %model,
            images = request.images.len(),
            timeout_secs = timeout.as_secs(),
            "Calling generative model"
        );

        let response = self
            .client
            .post(&endpoint)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .timeout(timeout)
            .json(&Self::build_body(&request))
            .send()
            .await?;

        let wire: WireResponse = Self::parse_response(response).await?;
        wire.into_response()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    text: Option<String>,
    #[serde(alias = "inline_data")]
    inline_data: Option<WireBlob>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

impl WireResponse {
    fn into_response(self) -> Result<GenerateResponse, GenAiError> {
        let mut out = GenerateResponse::default();

        // A prompt rejected outright comes back with no candidates and a
        // block reason instead.
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            out.finish_reason = Some(match FinishReason::parse(&reason) {
                FinishReason::Other(_) => FinishReason::ProhibitedContent,
                known => known,
            });
        }

        for candidate in self.candidates {
            if out.finish_reason.is_none() {
                out.finish_reason = candidate.finish_reason.as_deref().map(FinishReason::parse);
            }
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for part in parts {
                if let Some(blob) = part.inline_data {
                    let bytes = BASE64.decode(blob.data.as_bytes()).map_err(|e| {
                        GenAiError::InvalidResponse(format!("inline image is not base64: {e}"))
                    })?;
                    out.image_parts.push(InlineImage::new(bytes, blob.mime_type));
                } else if let Some(text) = part.text.filter(|_| !part.thought) {
                    out.text_parts.push(text);
                }
            }
        }
        Ok(out)
    }
}
