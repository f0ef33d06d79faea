//! Route definitions for the `/projects` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{events, projects};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                              -> list_projects (?owner_id=)
/// POST   /                              -> create_project
/// GET    /{id}                          -> get_project
/// DELETE /{id}                          -> delete_project
/// GET    /{id}/events                   -> project_events
/// POST   /{id}/generations              -> add_generation
/// DELETE /{id}/generations/{gen_id}     -> delete_generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/{id}", get(projects::get_project).delete(projects::delete_project))
        .route("/{id}/events", get(events::project_events))
        .route("/{id}/generations", post(projects::add_generation))
        .route("/{id}/generations/{gen_id}", delete(projects::delete_generation))
}
