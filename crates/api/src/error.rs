use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roomcraft_core::error::CoreError;
use roomcraft_db::StoreError;
use roomcraft_pipeline::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{ "error": message, "code": CODE }`
/// bodies with a status chosen per error kind.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stage or regenerate failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Store(err) => classify_core_error(err.into()),
            AppError::Pipeline(err) => classify_pipeline_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::InternalError(msg) => internal(&msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
        CoreError::Internal(msg) => internal(&msg),
    }
}

/// Upstream failures are 5xx gateway errors; a refused render is the
/// caller's content, hence 422.
fn classify_pipeline_error(err: PipelineError) -> (StatusCode, &'static str, String) {
    let status = match err {
        PipelineError::Store(store) => return classify_core_error(store.into()),
        PipelineError::ContentPolicyBlocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::MalformedModelOutput(_)
        | PipelineError::NoImageProduced(_)
        | PipelineError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        PipelineError::AssetPersistFailure(_)
        | PipelineError::Cancelled
        | PipelineError::Internal(_) => {
            return internal(&err.to_string());
        }
    };
    (status, err.code(), err.to_string())
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
