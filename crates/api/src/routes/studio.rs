//! Synchronous stage endpoints used by interactive flows. None of them
//! touch a project's state machine.

use axum::routing::post;
use axum::Router;

use crate::handlers::studio;
use crate::state::AppState;

/// Routes mounted at `/studio`.
///
/// ```text
/// POST /plan            -> plan
/// POST /shop            -> shop
/// POST /generate        -> generate
/// POST /enhance-prompt  -> enhance_prompt
/// POST /analyze         -> analyze
/// POST /chat            -> chat
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plan", post(studio::plan))
        .route("/shop", post(studio::shop))
        .route("/generate", post(studio::generate))
        .route("/enhance-prompt", post(studio::enhance_prompt))
        .route("/analyze", post(studio::analyze))
        .route("/chat", post(studio::chat))
}
