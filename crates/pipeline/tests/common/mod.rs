use std::sync::Arc;

use roomcraft_core::project::{Budget, NewProject, Project};
use roomcraft_core::types::ProjectId;
use roomcraft_db::{MemoryBlobStore, MemoryProjectStore, ProjectStore};
use roomcraft_events::EventBus;
use roomcraft_pipeline::testing::{fake_jpeg, ScriptedModel, ScriptedSearch, StaticFetcher};
use roomcraft_pipeline::{Collaborators, Orchestrator, PipelineConfig};

pub const ROOM_PHOTO: &str = "https://uploads.example/room.jpg";

/// An orchestrator over in-memory stores plus handles to every double.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryProjectStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub events: Arc<EventBus>,
    pub model: Arc<ScriptedModel>,
    pub search: Arc<ScriptedSearch>,
}

impl Harness {
    /// `fetcher` gets the room photo and the blob store added.
    pub fn new(model: ScriptedModel, search: ScriptedSearch, fetcher: StaticFetcher) -> Self {
        Self::with_config(model, search, fetcher, PipelineConfig::default())
    }

    pub fn with_config(
        model: ScriptedModel,
        search: ScriptedSearch,
        fetcher: StaticFetcher,
        config: PipelineConfig,
    ) -> Self {
        Self::with_store(model, search, fetcher, config, |store| store)
    }

    /// Like [`Harness::with_config`], with the orchestrator's view of the
    /// project store produced by `wrap`. `store` stays the inner store.
    pub fn with_store(
        model: ScriptedModel,
        search: ScriptedSearch,
        fetcher: StaticFetcher,
        config: PipelineConfig,
        wrap: impl FnOnce(Arc<dyn ProjectStore>) -> Arc<dyn ProjectStore>,
    ) -> Self {
        let store = Arc::new(MemoryProjectStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let events = Arc::new(EventBus::default());
        let model = Arc::new(model);
        let search = Arc::new(search);
        let fetcher = fetcher
            .with_image(ROOM_PHOTO, fake_jpeg())
            .with_blob_store(blobs.clone());

        let orchestrator = Orchestrator::new(
            wrap(store.clone()),
            events.clone(),
            Collaborators {
                model: model.clone(),
                search: search.clone(),
                fetcher: Arc::new(fetcher),
                blobs: blobs.clone(),
            },
            config,
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            blobs,
            events,
            model,
            search,
        }
    }

    /// Insert a pending project and return its id.
    pub async fn create_project(&self, room_type: &str, style: &str, budget: Budget) -> ProjectId {
        let project = NewProject {
            owner_id: "owner-1".into(),
            name: None,
            original_image_url: Some(ROOM_PHOTO.into()),
            room_type: room_type.into(),
            style: style.into(),
            budget,
        }
        .into_project();
        self.store.create(&project).await.expect("create project");
        project.id
    }

    pub async fn project(&self, id: ProjectId) -> Project {
        self.store
            .get(id)
            .await
            .expect("store read")
            .expect("project exists")
    }
}
