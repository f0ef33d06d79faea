//! Handlers for the `/projects` resource.
//!
//! Creating a project stores it as `pending` and hands its id to the run
//! queue when a worker runs in this process. Without one, an external
//! worker's poller picks the project up.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use roomcraft_core::error::CoreError;
use roomcraft_core::project::{NewProject, Project};
use roomcraft_core::types::ProjectId;
use roomcraft_events::{event_types, PlatformEvent};
use roomcraft_worker::EnqueueOutcome;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub owner_id: String,
}

/// Body of `POST /projects/{id}/generations`.
#[derive(Debug, Default, Deserialize)]
pub struct AddGeneration {
    /// Free-text direction for the render. Blank or absent derives one
    /// from the project's plan and products.
    #[serde(default)]
    pub instruction: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_project(state: &AppState, id: ProjectId) -> AppResult<Project> {
    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| project_not_found(id))
}

fn project_not_found(id: ProjectId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Project",
        id: id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/projects
///
/// Store a pending project and trigger its run. Returns 201 with the
/// project as created.
pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<NewProject>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let project = input.into_project();
    state.store.create(&project).await?;

    tracing::info!(
        project_id = %project.id,
        owner_id = %project.owner_id,
        room_type = %project.room_type,
        style = %project.style,
        "Project created",
    );
    state.events.publish(
        PlatformEvent::new(event_types::PROJECT_CREATED)
            .with_project(project.id, project.owner_id.clone())
            .with_status(project.status),
    );

    if let Some(queue) = &state.queue {
        if queue.enqueue(project.id) == EnqueueOutcome::Rejected {
            tracing::warn!(project_id = %project.id, "Run queue full, leaving project to the poller");
        }
    }

    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/projects?owner_id=...
///
/// The owner's projects, newest first.
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListProjectsQuery>,
) -> AppResult<impl IntoResponse> {
    let owner_id = params.owner_id.trim();
    if owner_id.is_empty() {
        return Err(AppError::BadRequest("owner_id must not be empty".into()));
    }
    let projects = state.store.list_by_owner(owner_id).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<impl IntoResponse> {
    let project = find_project(&state, id).await?;
    Ok(Json(DataResponse { data: project }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<impl IntoResponse> {
    if !state.store.delete(id).await? {
        return Err(project_not_found(id));
    }
    tracing::info!(project_id = %id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/generations
///
/// Render a new image for a completed project and append it. Returns 201
/// with the new generation; 409 unless the project is `completed`.
pub async fn add_generation(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Json(input): Json<AddGeneration>,
) -> AppResult<impl IntoResponse> {
    let generation = state.orchestrator.regenerate(id, input.instruction).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: generation })))
}

/// DELETE /api/v1/projects/{id}/generations/{gen_id}
pub async fn delete_generation(
    State(state): State<AppState>,
    Path((id, generation_id)): Path<(ProjectId, String)>,
) -> AppResult<impl IntoResponse> {
    if !state.store.delete_generation(id, &generation_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id: generation_id,
        }));
    }
    tracing::info!(project_id = %id, generation_id = %generation_id, "Generation deleted");
    Ok(StatusCode::NO_CONTENT)
}
