use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use tracing::debug;

use crate::domain::error::{Result, SyncError};
use crate::domain::mapping::MappingState;
use crate::domain::ports::RepoConfigStore;
use crate::domain::repo::RepositoryConfig;
use crate::domain::value_objects::{ProjectId, RepoId};
use crate::infrastructure::db::marker;

// ─── Sqlx Repo Config Store ──────────────────────────────────────────────────

/// `RepoConfigStore` over the `git_repo` table.
///
/// One row per project (unique on `project_id`); the mapping state is an
/// opaque JSON blob in the `mapping` column, read and written as a whole.
pub struct SqlxRepoConfigStore {
    pool: AnyPool,
    driver: String,
}

impl SqlxRepoConfigStore {
    pub fn new(pool: AnyPool, driver: impl Into<String>) -> Self {
        Self {
            pool,
            driver: driver.into(),
        }
    }

    fn m(&self, n: usize) -> String {
        marker(&self.driver, n)
    }

    fn row_to_config(row: &sqlx::any::AnyRow) -> Result<RepositoryConfig> {
        let mapping_json: String = row.try_get("mapping")?;
        let mapping: MappingState = if mapping_json.is_empty() {
            MappingState::new()
        } else {
            serde_json::from_str(&mapping_json)?
        };
        Ok(RepositoryConfig {
            id: RepoId(row.try_get("id")?),
            project_id: ProjectId(row.try_get("project_id")?),
            remote_url: row.try_get("remote_url")?,
            branch: row.try_get("branch")?,
            ssh_private_key: row.try_get("ssh_private_key")?,
            slug: row.try_get("slug")?,
            mapping,
        })
    }
}

#[async_trait]
impl RepoConfigStore for SqlxRepoConfigStore {
    async fn get(&self, id: &RepoId) -> Result<RepositoryConfig> {
        let sql = format!(
            "SELECT id, project_id, remote_url, branch, ssh_private_key, slug, mapping \
             FROM git_repo WHERE id = {}",
            self.m(1)
        );
        let row = sqlx::query(&sql)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SyncError::RepoNotFound(id.clone()))?;
        Self::row_to_config(&row)
    }

    async fn list_for_project(&self, project_id: &ProjectId) -> Result<Vec<RepositoryConfig>> {
        let sql = format!(
            "SELECT id, project_id, remote_url, branch, ssh_private_key, slug, mapping \
             FROM git_repo WHERE project_id = {} ORDER BY id",
            self.m(1)
        );
        let rows = sqlx::query(&sql)
            .bind(&project_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_config).collect()
    }

    async fn upsert(&self, config: RepositoryConfig) -> Result<RepositoryConfig> {
        // Portable upsert: the uniqueness constraint is per project, so the
        // previous row for the project (if any) is replaced wholesale.
        let sql = format!("DELETE FROM git_repo WHERE project_id = {}", self.m(1));
        sqlx::query(&sql)
            .bind(&config.project_id.0)
            .execute(&self.pool)
            .await?;

        let sql = format!(
            "INSERT INTO git_repo (id, project_id, remote_url, branch, ssh_private_key, slug, mapping) \
             VALUES ({}, {}, {}, {}, {}, {}, {})",
            self.m(1),
            self.m(2),
            self.m(3),
            self.m(4),
            self.m(5),
            self.m(6),
            self.m(7)
        );
        sqlx::query(&sql)
            .bind(&config.id.0)
            .bind(&config.project_id.0)
            .bind(&config.remote_url)
            .bind(&config.branch)
            .bind(&config.ssh_private_key)
            .bind(&config.slug)
            .bind(serde_json::to_string(&config.mapping)?)
            .execute(&self.pool)
            .await?;
        debug!(repo = %config.id, project = %config.project_id, "stored repo config");
        Ok(config)
    }

    async fn delete(&self, id: &RepoId) -> Result<()> {
        let sql = format!("DELETE FROM git_repo WHERE id = {}", self.m(1));
        let result = sqlx::query(&sql).bind(&id.0).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::RepoNotFound(id.clone()));
        }
        Ok(())
    }

    async fn save_mapping(&self, id: &RepoId, mapping: &MappingState) -> Result<()> {
        let sql = format!(
            "UPDATE git_repo SET mapping = {} WHERE id = {}",
            self.m(1),
            self.m(2)
        );
        let result = sqlx::query(&sql)
            .bind(serde_json::to_string(mapping)?)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::RepoNotFound(id.clone()));
        }
        Ok(())
    }
}
