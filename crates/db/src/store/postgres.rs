//! [`ProjectStore`] over the `projects` table.
//!
//! Plan, products and generations are JSONB columns written whole. Status
//! guards live in the `WHERE` clause so a guarded write and its check are
//! one statement; when nothing matched, a follow-up read tells `NotFound`
//! apart from `Conflict`.

use async_trait::async_trait;
use roomcraft_core::project::{Budget, Generation, PlanItem, Product, Project, ProjectStatus};
use roomcraft_core::types::{ProjectId, Timestamp};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use super::ProjectStore;
use crate::error::StoreError;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, name, original_image_url, room_type, style, budget, \
     status, plan, products, generations, error, created_at, updated_at, completed_at";

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: ProjectId,
    owner_id: String,
    name: String,
    original_image_url: Option<String>,
    room_type: String,
    style: String,
    budget: Json<Budget>,
    status: String,
    plan: Option<Json<Vec<PlanItem>>>,
    products: Option<Json<Vec<Product>>>,
    generations: Json<Vec<Generation>>,
    error: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
    completed_at: Option<Timestamp>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let status = ProjectStatus::from_name(&row.status)
            .map_err(|e| StoreError::Corrupt(format!("project {}: {e}", row.id)))?;
        Ok(Project {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            original_image_url: row.original_image_url,
            room_type: row.room_type,
            style: row.style,
            budget: row.budget.0,
            status,
            plan: row.plan.map(|j| j.0),
            products: row.products.map(|j| j.0),
            generations: row.generations.0,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Postgres-backed project store.
#[derive(Debug, Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Work out why a guarded update touched no rows.
    async fn explain_miss(&self, id: ProjectId, expected: &str) -> StoreError {
        let status: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT status FROM projects WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match status {
            Ok(Some((status,))) => {
                StoreError::Conflict(format!("project {id} is {status}, expected {expected}"))
            }
            Ok(None) => StoreError::NotFound(id),
            Err(e) => StoreError::Database(e),
        }
    }

    async fn exists(&self, id: ProjectId) -> Result<bool, StoreError> {
        let row: Option<(ProjectId,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn create(&self, project: &Project) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO projects (id, owner_id, name, original_image_url, room_type, style, \
                 budget, status, plan, products, generations, error, created_at, updated_at, \
                 completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(project.id)
        .bind(&project.owner_id)
        .bind(&project.name)
        .bind(&project.original_image_url)
        .bind(&project.room_type)
        .bind(&project.style)
        .bind(Json(project.budget))
        .bind(project.status.name())
        .bind(project.plan.as_ref().map(Json))
        .bind(project.products.as_ref().map(Json))
        .bind(Json(&project.generations))
        .bind(&project.error)
        .bind(project.created_at)
        .bind(project.updated_at)
        .bind(project.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }
        Ok(())
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        let row = sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Project::try_from).transpose()
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Project>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Project::try_from)
            .collect()
    }

    async fn list_by_status(
        &self,
        status: ProjectStatus,
        limit: usize,
    ) -> Result<Vec<Project>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects WHERE status = $1 ORDER BY created_at ASC, id ASC LIMIT $2"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(status.name())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Project::try_from)
            .collect()
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
        let result = sqlx::query(
            "UPDATE projects SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.name())
        .bind(to.name())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(id).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn set_plan(&self, id: ProjectId, plan: &[PlanItem]) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET plan = $2, updated_at = NOW()
             WHERE id = $1 AND status = 'generating'",
        )
        .bind(id)
        .bind(Json(plan))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "generating").await);
        }
        Ok(())
    }

    async fn set_products(&self, id: ProjectId, products: &[Product]) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET products = $2, updated_at = NOW()
             WHERE id = $1 AND status = 'generating'",
        )
        .bind(id)
        .bind(Json(products))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "generating").await);
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: ProjectId,
        plan: &[PlanItem],
        products: &[Product],
        generation: &Generation,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET
                plan = $2,
                products = $3,
                generations = generations || $4,
                status = 'completed',
                error = NULL,
                completed_at = NOW(),
                updated_at = NOW()
             WHERE id = $1 AND status = 'generating'",
        )
        .bind(id)
        .bind(Json(plan))
        .bind(Json(products))
        .bind(Json([generation]))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "generating").await);
        }
        Ok(())
    }

    async fn fail(&self, id: ProjectId, message: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET status = 'error', error = $2, updated_at = NOW()
             WHERE id = $1 AND status = 'generating'",
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "generating").await);
        }
        Ok(())
    }

    async fn append_generation(
        &self,
        id: ProjectId,
        generation: &Generation,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET generations = generations || $2, updated_at = NOW()
             WHERE id = $1 AND status <> 'error'",
        )
        .bind(id)
        .bind(Json([generation]))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "not error").await);
        }
        Ok(())
    }

    async fn delete_generation(
        &self,
        id: ProjectId,
        generation_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET
                generations = COALESCE(
                    (SELECT jsonb_agg(e.g ORDER BY e.ord)
                       FROM jsonb_array_elements(generations) WITH ORDINALITY AS e(g, ord)
                      WHERE e.g->>'id' <> $2),
                    '[]'::jsonb),
                updated_at = NOW()
             WHERE id = $1
               AND generations @> jsonb_build_array(jsonb_build_object('id', $2::text))",
        )
        .bind(id)
        .bind(generation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(id).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
