//! In-process [`ProjectStore`] backed by a `HashMap`.
//!
//! Used when `DATABASE_URL` is unset and throughout the test suites. The
//! write lock makes every operation atomic, which is what the CAS in
//! [`ProjectStore::transition_status`] relies on.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use roomcraft_core::project::{Generation, PlanItem, Product, Project, ProjectStatus};
use roomcraft_core::types::ProjectId;
use tokio::sync::RwLock;

use super::{require_generating, require_not_errored, ProjectStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the stored project under the write lock.
    async fn update<F>(&self, id: ProjectId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Project) -> Result<(), StoreError> + Send,
    {
        let mut guard = self.projects.write().await;
        let project = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        f(project)?;
        project.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: &Project) -> Result<(), StoreError> {
        let mut guard = self.projects.write().await;
        if guard.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }
        guard.insert(project.id, project.clone());
        Ok(())
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Project>, StoreError> {
        let guard = self.projects.read().await;
        let mut projects: Vec<Project> = guard
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn list_by_status(
        &self,
        status: ProjectStatus,
        limit: usize,
    ) -> Result<Vec<Project>, StoreError> {
        let guard = self.projects.read().await;
        let mut projects: Vec<Project> = guard
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        projects.truncate(limit);
        Ok(projects)
    }

    async fn transition_status(
        &self,
        id: ProjectId,
        from: ProjectStatus,
        to: ProjectStatus,
    ) -> Result<bool, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::Conflict(format!(
                "illegal transition {from} -> {to}"
            )));
        }
        let mut guard = self.projects.write().await;
        let project = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if project.status != from {
            return Ok(false);
        }
        project.status = to;
        project.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_plan(&self, id: ProjectId, plan: &[PlanItem]) -> Result<(), StoreError> {
        let plan = plan.to_vec();
        self.update(id, move |p| {
            require_generating(id, p.status)?;
            p.plan = Some(plan);
            Ok(())
        })
        .await
    }

    async fn set_products(&self, id: ProjectId, products: &[Product]) -> Result<(), StoreError> {
        let products = products.to_vec();
        self.update(id, move |p| {
            require_generating(id, p.status)?;
            p.products = Some(products);
            Ok(())
        })
        .await
    }

    async fn complete(
        &self,
        id: ProjectId,
        plan: &[PlanItem],
        products: &[Product],
        generation: &Generation,
    ) -> Result<(), StoreError> {
        let plan = plan.to_vec();
        let products = products.to_vec();
        let generation = generation.clone();
        self.update(id, move |p| {
            require_generating(id, p.status)?;
            p.plan = Some(plan);
            p.products = Some(products);
            p.generations.push(generation);
            p.status = ProjectStatus::Completed;
            p.error = None;
            p.completed_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    async fn fail(&self, id: ProjectId, message: &str) -> Result<(), StoreError> {
        let message = message.to_string();
        self.update(id, move |p| {
            require_generating(id, p.status)?;
            p.status = ProjectStatus::Error;
            p.error = Some(message);
            Ok(())
        })
        .await
    }

    async fn append_generation(
        &self,
        id: ProjectId,
        generation: &Generation,
    ) -> Result<(), StoreError> {
        let generation = generation.clone();
        self.update(id, move |p| {
            require_not_errored(id, p.status)?;
            p.generations.push(generation);
            Ok(())
        })
        .await
    }

    async fn delete_generation(
        &self,
        id: ProjectId,
        generation_id: &str,
    ) -> Result<bool, StoreError> {
        let mut guard = self.projects.write().await;
        let project = guard.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let before = project.generations.len();
        project.generations.retain(|g| g.id != generation_id);
        let removed = project.generations.len() != before;
        if removed {
            project.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError> {
        Ok(self.projects.write().await.remove(&id).is_some())
    }
}
