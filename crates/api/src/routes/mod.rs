pub mod health;
pub mod projects;
pub mod studio;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /projects                       create, list by owner
/// /projects/{id}                  get, delete
/// /projects/{id}/events           server-sent lifecycle events
/// /projects/{id}/generations      regenerate
/// /projects/{id}/generations/{g}  delete one generation
/// /studio/plan                    plan stage only
/// /studio/shop                    shop stage only
/// /studio/generate                render stage only
/// /studio/enhance-prompt          prompt review
/// /studio/chat                    design assistant
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", projects::router())
        .nest("/studio", studio::router())
}
