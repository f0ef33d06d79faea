//! Server-sent lifecycle events for one project.
//!
//! The stream opens with a `project.snapshot` event carrying the current
//! status, then forwards bus events about the project until a terminal one
//! (`project.completed` / `project.failed`) has been sent. A project that
//! is already terminal gets the snapshot only.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::stream::{self, BoxStream};
use futures::{future, StreamExt};
use roomcraft_core::error::CoreError;
use roomcraft_core::types::ProjectId;
use roomcraft_events::{event_types, PlatformEvent};
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const SNAPSHOT_EVENT: &str = "project.snapshot";

/// GET /api/v1/projects/{id}/events
pub async fn project_events(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>>> {
    // Subscribe before reading so nothing published in between is lost.
    let receiver = state.events.subscribe();
    let project = state.store.get(id).await?.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: id.to_string(),
        })
    })?;

    let snapshot = PlatformEvent::new(SNAPSHOT_EVENT)
        .with_project(project.id, project.owner_id.clone())
        .with_status(project.status);
    let head = stream::once(future::ready(snapshot));

    let events: BoxStream<'static, PlatformEvent> = if project.status.is_terminal() {
        head.boxed()
    } else {
        let live = BroadcastStream::new(receiver)
            .filter_map(move |received| {
                future::ready(match received {
                    Ok(event) if event.concerns(id) => Some(event),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!(project_id = %id, error = %e, "Event stream lagged");
                        None
                    }
                })
            })
            .scan(false, |finished, event| {
                if *finished {
                    return future::ready(None);
                }
                *finished = event_types::is_terminal(&event.event_type);
                future::ready(Some(event))
            });
        head.chain(live).boxed()
    };

    let stream = events
        .take_until(state.shutdown.clone().cancelled_owned())
        .map(|event| Ok(to_sse(&event)))
        .boxed();

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &PlatformEvent) -> Event {
    let sse = Event::default().event(&event.event_type);
    match serde_json::to_string(event) {
        Ok(json) => sse.data(json),
        Err(e) => {
            tracing::error!(error = %e, event_type = %event.event_type, "Event not serializable");
            sse
        }
    }
}
