//! The project document store.
//!
//! Every write replaces whole fields (plan, products, the generation list),
//! so concurrent readers never observe a half-written list. Writes that
//! belong to a run are guarded by the project status: once a project is
//! terminal a late write from a cancelled or failed run is refused with
//! [`StoreError::Conflict`].

use async_trait::async_trait;
use roomcraft_core::project::{Generation, PlanItem, Product, Project, ProjectStatus};
use roomcraft_core::types::ProjectId;

use crate::error::StoreError;

mod memory;
mod postgres;

pub use memory::MemoryProjectStore;
pub use postgres::PgProjectStore;

/// Create/get/update/delete for projects keyed by id.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a new project. Fails with `Conflict` if the id already exists.
    async fn create(&self, project: &Project) -> Result<(), StoreError>;

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// Projects owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Project>, StoreError>;

    /// Up to `limit` projects in `status`, oldest first.
    async fn list_by_status(
        &self,
        status: ProjectStatus,
        limit: usize,
    ) -> Result<Vec<Project>, StoreError>;

    /// Compare-and-set the status. Returns `true` only when the project was
    /// in `from` and is now in `to`; exactly one concurrent caller wins.
    async fn transition_status(
        &self,
        id: ProjectId,
        from: ProjectStatus,
        to: ProjectStatus,
    ) -> Result<bool, StoreError>;

    /// Replace the plan of a generating project.
    async fn set_plan(&self, id: ProjectId, plan: &[PlanItem]) -> Result<(), StoreError>;

    /// Replace the product list of a generating project.
    async fn set_products(&self, id: ProjectId, products: &[Product]) -> Result<(), StoreError>;

    /// Write plan, products, a new generation, `completed` and the
    /// completion timestamp in one update.
    async fn complete(
        &self,
        id: ProjectId,
        plan: &[PlanItem],
        products: &[Product],
        generation: &Generation,
    ) -> Result<(), StoreError>;

    /// Move a generating project to `error`, keeping plan and products.
    async fn fail(&self, id: ProjectId, message: &str) -> Result<(), StoreError>;

    /// Append a generation. Refused while the project is in `error`.
    async fn append_generation(
        &self,
        id: ProjectId,
        generation: &Generation,
    ) -> Result<(), StoreError>;

    /// Remove one generation. Returns `false` if the id was not present.
    async fn delete_generation(
        &self,
        id: ProjectId,
        generation_id: &str,
    ) -> Result<bool, StoreError>;

    /// Delete the project. Returns `false` if it did not exist.
    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError>;
}

/// Shared guard for run-scoped writes.
pub(crate) fn require_generating(id: ProjectId, status: ProjectStatus) -> Result<(), StoreError> {
    if status == ProjectStatus::Generating {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "project {id} is {status}, expected generating"
        )))
    }
}

/// Shared guard for appending generations.
pub(crate) fn require_not_errored(id: ProjectId, status: ProjectStatus) -> Result<(), StoreError> {
    if status == ProjectStatus::Error {
        Err(StoreError::Conflict(format!(
            "project {id} is in error; generations are frozen"
        )))
    } else {
        Ok(())
    }
}
