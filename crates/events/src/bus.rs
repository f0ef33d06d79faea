//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the API (which
//! publishes `project.created` and streams events to clients) and the
//! orchestrator (which publishes the rest of the lifecycle).

use chrono::{DateTime, Utc};
use roomcraft_core::project::ProjectStatus;
use roomcraft_core::types::ProjectId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names.
pub mod event_types {
    pub const PROJECT_CREATED: &str = "project.created";
    pub const PROJECT_GENERATING: &str = "project.generating";
    pub const PROJECT_PLAN_READY: &str = "project.plan_ready";
    pub const PROJECT_PRODUCTS_READY: &str = "project.products_ready";
    pub const PROJECT_COMPLETED: &str = "project.completed";
    pub const PROJECT_FAILED: &str = "project.failed";
    pub const GENERATION_ADDED: &str = "project.generation_added";

    /// Events after which a project will not change on its own.
    pub fn is_terminal(event_type: &str) -> bool {
        matches!(event_type, PROJECT_COMPLETED | PROJECT_FAILED)
    }
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// Something that happened to a project.
///
/// Constructed via [`PlatformEvent::new`] and enriched with
/// [`with_project`](PlatformEvent::with_project),
/// [`with_status`](PlatformEvent::with_status) and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"project.completed"`.
    pub event_type: String,

    pub project_id: Option<ProjectId>,

    pub owner_id: Option<String>,

    /// Project status after the event.
    pub status: Option<ProjectStatus>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            project_id: None,
            owner_id: None,
            status: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the project (and its owner) the event is about.
    pub fn with_project(mut self, project_id: ProjectId, owner_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id);
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether the event is about `project_id`.
    pub fn concerns(&self, project_id: ProjectId) -> bool {
        self.project_id == Some(project_id)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use roomcraft_events::bus::{event_types, EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new(event_types::PROJECT_CREATED));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is listening.
    pub fn publish(&self, event: PlatformEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            project_id = ?event.project_id,
            "Publishing event"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ProjectId {
        ProjectId::now_v7()
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let project = id();

        bus.publish(
            PlatformEvent::new(event_types::PROJECT_PLAN_READY)
                .with_project(project, "owner-7")
                .with_status(ProjectStatus::Generating)
                .with_payload(serde_json::json!({"items": 9})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "project.plan_ready");
        assert_eq!(received.project_id, Some(project));
        assert_eq!(received.owner_id.as_deref(), Some("owner-7"));
        assert_eq!(received.status, Some(ProjectStatus::Generating));
        assert_eq!(received.payload["items"], 9);
        assert!(received.concerns(project));
        assert!(!received.concerns(id()));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::PROJECT_CREATED));

        assert_eq!(rx1.recv().await.unwrap().event_type, "project.created");
        assert_eq!(rx2.recv().await.unwrap().event_type, "project.created");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn terminal_event_types() {
        assert!(event_types::is_terminal(event_types::PROJECT_COMPLETED));
        assert!(event_types::is_terminal(event_types::PROJECT_FAILED));
        assert!(!event_types::is_terminal(event_types::PROJECT_GENERATING));
    }

    #[test]
    fn serializes_status_in_snake_case() {
        let event = PlatformEvent::new(event_types::PROJECT_FAILED)
            .with_project(id(), "o")
            .with_status(ProjectStatus::Error);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["event_type"], "project.failed");
    }
}
