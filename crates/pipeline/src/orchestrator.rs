//! Pipeline orchestrator.
//!
//! Owns the project state machine for one run:
//!
//! ```text
//! pending ──claim──▶ generating ──▶ completed
//!                         │
//!                         └──────▶ error
//! ```
//!
//! The claim is a compare-and-set on the store, so of any number of
//! concurrent triggers for the same project exactly one proceeds. Plan and
//! Shop failures degrade to empty results; a Render failure, a failed
//! persistence of the rendered image, or cancellation ends the run in
//! `error` with the plan and products kept for diagnosis.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roomcraft_core::project::{Generation, Product, Project, ProjectStatus};
use roomcraft_core::types::{new_id, ProjectId};
use roomcraft_db::{BlobStore, ProjectStore, StoreError};
use roomcraft_events::{event_types, EventBus, PlatformEvent};
use roomcraft_genai::GenerativeModel;
use roomcraft_search::ProductSearch;
use tokio_util::sync::CancellationToken;

use crate::assets::AssetPersister;
use crate::assistant::Assistant;
use crate::brief::RoomBrief;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetch::ImageFetcher;
use crate::plan::PlanStage;
use crate::prompts;
use crate::render::{RenderRequest, RenderStage};
use crate::shop::ShopStage;

/// External services a pipeline is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn GenerativeModel>,
    pub search: Arc<dyn ProductSearch>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub blobs: Arc<dyn BlobStore>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { generation_id: String },
    Failed { code: &'static str, message: String },
    /// Another trigger already claimed the project, or it no longer exists.
    Skipped,
}

pub struct Orchestrator {
    store: Arc<dyn ProjectStore>,
    events: Arc<EventBus>,
    plan: PlanStage,
    shop: ShopStage,
    render: RenderStage,
    assistant: Assistant,
    persister: Arc<AssetPersister>,
    retry_delays: Vec<Duration>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        events: Arc<EventBus>,
        collaborators: Collaborators,
        config: PipelineConfig,
    ) -> Self {
        let retry_delays = config.store_retry_delays.clone();
        let config = Arc::new(config);
        let Collaborators {
            model,
            search,
            fetcher,
            blobs,
        } = collaborators;
        let persister = Arc::new(AssetPersister::new(
            blobs,
            fetcher.clone(),
            config.product_image_timeout,
        ));
        Self {
            store,
            events,
            plan: PlanStage::new(model.clone(), fetcher.clone(), config.clone()),
            shop: ShopStage::new(
                model.clone(),
                search,
                fetcher.clone(),
                persister.clone(),
                config.clone(),
            ),
            render: RenderStage::new(model.clone(), fetcher.clone(), config.clone()),
            assistant: Assistant::new(model, fetcher, config),
            persister,
            retry_delays,
        }
    }

    pub fn plan_stage(&self) -> &PlanStage {
        &self.plan
    }

    pub fn shop_stage(&self) -> &ShopStage {
        &self.shop
    }

    pub fn render_stage(&self) -> &RenderStage {
        &self.render
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Full run
    // -----------------------------------------------------------------------

    /// Run the pipeline for a pending project until it is terminal.
    ///
    /// Errors are returned only when the store cannot be reached to claim
    /// the project, or when recording the failure still fails after every
    /// retry; every other failure after the claim is written to the
    /// project and reported as [`RunOutcome::Failed`].
    pub async fn run(
        &self,
        project_id: ProjectId,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let claimed = self
            .store
            .transition_status(project_id, ProjectStatus::Pending, ProjectStatus::Generating)
            .await?;
        if !claimed {
            tracing::info!(project_id = %project_id, "Project already claimed, skipping run");
            return Ok(RunOutcome::Skipped);
        }

        let store = &self.store;
        let project = match with_store_retry(&self.retry_delays, project_id, "read", move || {
            store.get(project_id)
        })
        .await
        {
            Ok(Some(project)) => project,
            Ok(None) => {
                tracing::warn!(project_id = %project_id, "Project vanished after claim");
                return Ok(RunOutcome::Skipped);
            }
            // The claim landed, so the project must not stay generating.
            Err(e) => return self.record_failure(project_id, None, e.into()).await,
        };

        tracing::info!(
            project_id = %project_id,
            room_type = %project.room_type,
            style = %project.style,
            "Pipeline run started",
        );
        self.publish(&project, event_types::PROJECT_GENERATING, ProjectStatus::Generating, serde_json::json!({}));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            r = self.execute(&project) => r,
        };

        match result {
            Ok(generation) => {
                tracing::info!(project_id = %project_id, generation_id = %generation.id, "Pipeline run completed");
                self.publish(
                    &project,
                    event_types::PROJECT_COMPLETED,
                    ProjectStatus::Completed,
                    serde_json::json!({
                        "generation_id": generation.id,
                        "image_url": generation.image_url,
                    }),
                );
                Ok(RunOutcome::Completed {
                    generation_id: generation.id,
                })
            }
            Err(e) => {
                self.record_failure(project_id, Some(&project.owner_id), e)
                    .await
            }
        }
    }

    /// Mark a run that died without reporting (its task panicked) as
    /// failed. A project that already left `generating` is left alone.
    pub async fn abandon(
        &self,
        project_id: ProjectId,
        reason: &str,
    ) -> Result<RunOutcome, PipelineError> {
        let owner = match self.store.get(project_id).await {
            Ok(Some(project)) if project.status != ProjectStatus::Generating => {
                return Ok(RunOutcome::Skipped);
            }
            Ok(Some(project)) => Some(project.owner_id),
            Ok(None) => return Ok(RunOutcome::Skipped),
            Err(e) => {
                tracing::warn!(project_id = %project_id, error = %e, "Could not read abandoned project");
                None
            }
        };
        self.record_failure(
            project_id,
            owner.as_deref(),
            PipelineError::Internal(reason.to_string()),
        )
        .await
    }

    async fn execute(&self, project: &Project) -> Result<Generation, PipelineError> {
        let brief = RoomBrief::from(project);

        let plan = self.plan.run(&brief).await;
        self.store.set_plan(project.id, &plan).await?;
        self.publish(
            project,
            event_types::PROJECT_PLAN_READY,
            ProjectStatus::Generating,
            serde_json::json!({ "items": plan.len() }),
        );

        let products = self.shop.run(&brief, &plan).await;
        self.store.set_products(project.id, &products).await?;
        self.publish(
            project,
            event_types::PROJECT_PRODUCTS_READY,
            ProjectStatus::Generating,
            serde_json::json!({ "products": products.len() }),
        );

        let instruction = prompts::derived_instruction(&brief.style, &plan, &products);
        let generation = self
            .render_and_persist(project.id, brief, instruction, image_urls(&products))
            .await?;

        let store = &self.store;
        let (id, plan_ref, products_ref, generation_ref) =
            (project.id, plan.as_slice(), products.as_slice(), &generation);
        with_store_retry(&self.retry_delays, id, "complete", move || {
            store.complete(id, plan_ref, products_ref, generation_ref)
        })
        .await?;
        Ok(generation)
    }

    async fn render_and_persist(
        &self,
        project_id: ProjectId,
        brief: RoomBrief,
        instruction: String,
        reference_image_urls: Vec<String>,
    ) -> Result<Generation, PipelineError> {
        let request = RenderRequest {
            brief,
            instruction: instruction.clone(),
            reference_image_urls,
        };
        let rendered = self.render.render(&request).await?;

        let generation_id = new_id().to_string();
        let url = self
            .persister
            .persist_generation(project_id, &generation_id, rendered.bytes, &rendered.content_type)
            .await?;
        Ok(Generation::new(generation_id, url, instruction))
    }

    async fn record_failure(
        &self,
        project_id: ProjectId,
        owner_id: Option<&str>,
        err: PipelineError,
    ) -> Result<RunOutcome, PipelineError> {
        let message = err.user_message();
        let code = err.code();
        tracing::error!(project_id = %project_id, code, error = %err, "Pipeline run failed");

        let store = &self.store;
        let stored_message = message.as_str();
        match with_store_retry(&self.retry_delays, project_id, "fail", move || {
            store.fail(project_id, stored_message)
        })
        .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                // Cancellation can race the final write; report what landed.
                if let Some(current) = self.store.get(project_id).await? {
                    if current.status == ProjectStatus::Completed {
                        if let Some(generation) = current.latest_generation() {
                            return Ok(RunOutcome::Completed {
                                generation_id: generation.id.clone(),
                            });
                        }
                    }
                }
                tracing::warn!(project_id = %project_id, "Project no longer generating, failure not recorded");
            }
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(project_id = %project_id, "Project deleted during run");
                return Ok(RunOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        }

        let mut event = PlatformEvent::new(event_types::PROJECT_FAILED)
            .with_status(ProjectStatus::Error)
            .with_payload(serde_json::json!({ "error": message, "code": code }));
        event = match owner_id {
            Some(owner) => event.with_project(project_id, owner),
            None => {
                event.project_id = Some(project_id);
                event
            }
        };
        self.events.publish(event);
        Ok(RunOutcome::Failed { code, message })
    }

    // -----------------------------------------------------------------------
    // Caller-initiated generations
    // -----------------------------------------------------------------------

    /// Render a new image for a completed project and append it.
    ///
    /// `instruction` defaults to one derived from the stored plan and
    /// products.
    pub async fn regenerate(
        &self,
        project_id: ProjectId,
        instruction: Option<String>,
    ) -> Result<Generation, PipelineError> {
        let project = self
            .store
            .get(project_id)
            .await?
            .ok_or(StoreError::NotFound(project_id))?;
        if !project.accepts_generations() {
            return Err(StoreError::Conflict(format!(
                "project {project_id} is {}; generations can only be added to completed projects",
                project.status
            ))
            .into());
        }

        let plan = project.plan.as_deref().unwrap_or_default();
        let products = project.products.as_deref().unwrap_or_default();
        let instruction = instruction
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| prompts::derived_instruction(&project.style, plan, products));

        let generation = self
            .render_and_persist(
                project_id,
                RoomBrief::from(&project),
                instruction,
                project.product_image_urls(),
            )
            .await?;
        self.store.append_generation(project_id, &generation).await?;

        tracing::info!(project_id = %project_id, generation_id = %generation.id, "Generation appended");
        self.publish(
            &project,
            event_types::GENERATION_ADDED,
            project.status,
            serde_json::json!({
                "generation_id": generation.id,
                "image_url": generation.image_url,
            }),
        );
        Ok(generation)
    }

    fn publish(&self, project: &Project, event_type: &str, status: ProjectStatus, payload: serde_json::Value) {
        self.events.publish(
            PlatformEvent::new(event_type)
                .with_project(project.id, project.owner_id.clone())
                .with_status(status)
                .with_payload(payload),
        );
    }
}

/// Retry a store operation through `delays`. Conflicts and missing
/// projects are answers, not outages, and are returned at once.
async fn with_store_retry<T, F, Fut>(
    delays: &[Duration],
    id: ProjectId,
    operation: &'static str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delays = delays.iter();
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e @ (StoreError::Conflict(_) | StoreError::NotFound(_))) => return Err(e),
            Err(e) => match delays.next() {
                Some(delay) => {
                    tracing::warn!(project_id = %id, operation, error = %e, "Store call failed, retrying");
                    tokio::time::sleep(*delay).await;
                }
                None => {
                    tracing::error!(project_id = %id, operation, error = %e, "Store call failed after all retries");
                    return Err(e);
                }
            },
        }
    }
}

fn image_urls(products: &[Product]) -> Vec<String> {
    products.iter().map(|p| p.image_url.clone()).collect()
}
