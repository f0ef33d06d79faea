/// Errors from a generative model call.
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("Model request timed out")]
    Timeout,

    /// Network failure before a response arrived (DNS, TLS, reset).
    #[error("Model service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-2xx status.
    #[error("Model API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A 2xx response whose body could not be understood.
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
}

impl From<reqwest::Error> for GenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenAiError::Timeout
        } else if err.is_decode() {
            GenAiError::InvalidResponse(err.to_string())
        } else {
            GenAiError::Unavailable(err.to_string())
        }
    }
}
