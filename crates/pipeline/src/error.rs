use roomcraft_core::json_repair::JsonRepairError;
use roomcraft_db::{BlobError, StoreError};
use roomcraft_genai::GenAiError;
use roomcraft_search::SearchError;

/// Failure kinds a stage or run can end with.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The model's answer held no parseable JSON even after repair.
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    /// The render was refused by the model's content policy.
    #[error("Blocked by content policy: {0}")]
    ContentPolicyBlocked(String),

    /// The render call succeeded but returned no image part.
    #[error("No image produced: {0}")]
    NoImageProduced(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An image could not be fetched or re-hosted.
    #[error("Asset persistence failed: {0}")]
    AssetPersistFailure(String),

    #[error("cancelled")]
    Cancelled,

    /// The run aborted unexpectedly (a panic in a stage).
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Stable machine-readable code, used in API error bodies and events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedModelOutput(_) => "MALFORMED_MODEL_OUTPUT",
            Self::ContentPolicyBlocked(_) => "CONTENT_POLICY_BLOCKED",
            Self::NoImageProduced(_) => "NO_IMAGE_PRODUCED",
            Self::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::AssetPersistFailure(_) => "ASSET_PERSIST_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Message stored on a failed project.
    pub fn user_message(&self) -> String {
        match self {
            Self::Cancelled => "cancelled".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<GenAiError> for PipelineError {
    fn from(err: GenAiError) -> Self {
        match err {
            GenAiError::Timeout => Self::UpstreamTimeout("generative model".into()),
            other => Self::UpstreamUnavailable(format!("generative model: {other}")),
        }
    }
}

impl From<SearchError> for PipelineError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Timeout => Self::UpstreamTimeout("web search".into()),
            other => Self::UpstreamUnavailable(format!("web search: {other}")),
        }
    }
}

impl From<JsonRepairError> for PipelineError {
    fn from(err: JsonRepairError) -> Self {
        Self::MalformedModelOutput(err.to_string())
    }
}

impl From<BlobError> for PipelineError {
    fn from(err: BlobError) -> Self {
        Self::AssetPersistFailure(err.to_string())
    }
}
