/// Errors from a web search call.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request timed out")]
    Timeout,

    #[error("Search service unavailable: {0}")]
    Unavailable(String),

    #[error("Search API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    /// `GOOGLE_CSE_API_KEY` / `GOOGLE_CSE_CX` are not set.
    #[error("Web search is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else if err.is_decode() {
            SearchError::InvalidResponse(err.to_string())
        } else {
            SearchError::Unavailable(err.to_string())
        }
    }
}
