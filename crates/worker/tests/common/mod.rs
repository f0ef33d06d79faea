use std::sync::Arc;
use std::time::Duration;

use roomcraft_core::project::{Budget, NewProject, Project, ProjectStatus};
use roomcraft_core::types::ProjectId;
use roomcraft_db::{MemoryBlobStore, MemoryProjectStore, ProjectStore};
use roomcraft_events::EventBus;
use roomcraft_pipeline::testing::{fake_jpeg, result, ScriptedModel, ScriptedSearch, StaticFetcher};
use roomcraft_pipeline::{Collaborators, Orchestrator, PipelineConfig};

pub const ROOM_PHOTO: &str = "https://uploads.example/room.jpg";

pub struct Services {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryProjectStore>,
    pub model: Arc<ScriptedModel>,
}

pub fn services(model: ScriptedModel) -> Services {
    let store = Arc::new(MemoryProjectStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let model = Arc::new(model);
    let search = ScriptedSearch::new().with_fallback(vec![result(
        "Lampe Papier - Boutique",
        "https://shop.example/lampe",
        "https://cdn.example/lampe.jpg",
    )]);
    let fetcher = StaticFetcher::new()
        .with_image(ROOM_PHOTO, fake_jpeg())
        .with_image("https://cdn.example/lampe.jpg", fake_jpeg())
        .with_blob_store(blobs.clone());

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(EventBus::default()),
        Collaborators {
            model: model.clone(),
            search: Arc::new(search),
            fetcher: Arc::new(fetcher),
            blobs,
        },
        PipelineConfig::default(),
    );

    Services {
        orchestrator: Arc::new(orchestrator),
        store,
        model,
    }
}

pub async fn create_pending(store: &MemoryProjectStore) -> ProjectId {
    let project = NewProject {
        owner_id: "owner-1".into(),
        name: None,
        original_image_url: Some(ROOM_PHOTO.into()),
        room_type: "bedroom".into(),
        style: "scandinavian".into(),
        budget: Budget::Unlimited,
    }
    .into_project();
    store.create(&project).await.expect("create project");
    project.id
}

/// Poll the store until the project leaves `pending`/`generating`.
pub async fn wait_terminal(store: &MemoryProjectStore, id: ProjectId) -> Project {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let project = store.get(id).await.expect("store read").expect("project exists");
        if matches!(project.status, ProjectStatus::Completed | ProjectStatus::Error) {
            return project;
        }
        assert!(tokio::time::Instant::now() < deadline, "run did not finish");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
