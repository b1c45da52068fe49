use async_trait::async_trait;
use chrono::Utc;
use sqlx::{AnyPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::{Result, SyncError};
use crate::domain::flow::{DbFlow, FlowDefinition, FlowStatus};
use crate::domain::ports::FlowRecordRepository;
use crate::domain::value_objects::{ProjectId, TargetId};
use crate::infrastructure::db::marker;

// ─── Sqlx Flow Repository ────────────────────────────────────────────────────

/// `FlowRecordRepository` over the project's `flow` / `flow_version` tables.
///
/// A flow row carries identity, project ownership, publish status and a
/// pointer to the published version; every content change appends a
/// `flow_version` row holding the display name and the trigger subtree as
/// a JSON document. "Populated" always means joined with the latest
/// version.
pub struct SqlxFlowRepository {
    pool: AnyPool,
    driver: String,
}

impl SqlxFlowRepository {
    pub fn new(pool: AnyPool, driver: impl Into<String>) -> Self {
        Self {
            pool,
            driver: driver.into(),
        }
    }

    fn m(&self, n: usize) -> String {
        marker(&self.driver, n)
    }

    fn row_to_flow(row: &sqlx::any::AnyRow) -> Result<DbFlow> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let display_name: String = row.try_get("display_name")?;
        let trigger_json: String = row.try_get("trigger_tree")?;
        let trigger = serde_json::from_str(&trigger_json)?;
        Ok(DbFlow {
            target_id: TargetId(id),
            definition: FlowDefinition {
                display_name,
                trigger,
            },
            status: if status == "ENABLED" {
                FlowStatus::Enabled
            } else {
                FlowStatus::Disabled
            },
        })
    }

    async fn insert_version(&self, flow_id: &str, definition: &FlowDefinition) -> Result<String> {
        let version_id = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO flow_version (id, flow_id, display_name, trigger_tree, created) \
             VALUES ({}, {}, {}, {}, {})",
            self.m(1),
            self.m(2),
            self.m(3),
            self.m(4),
            self.m(5)
        );
        sqlx::query(&sql)
            .bind(&version_id)
            .bind(flow_id)
            .bind(&definition.display_name)
            .bind(serde_json::to_string(&definition.trigger)?)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(version_id)
    }
}

#[async_trait]
impl FlowRecordRepository for SqlxFlowRepository {
    async fn list_for_project(&self, project_id: &ProjectId) -> Result<Vec<DbFlow>> {
        let sql = format!(
            "SELECT f.id, f.status, fv.display_name, fv.trigger_tree \
             FROM flow f \
             JOIN flow_version fv ON fv.flow_id = f.id \
             WHERE f.project_id = {} \
               AND fv.created = (SELECT MAX(created) FROM flow_version WHERE flow_id = f.id) \
             ORDER BY f.id",
            self.m(1)
        );
        let rows = sqlx::query(&sql)
            .bind(&project_id.0)
            .fetch_all(&self.pool)
            .await?;
        debug!(project = %project_id, count = rows.len(), "fetched flow records");
        rows.iter().map(Self::row_to_flow).collect()
    }

    async fn get_one_populated(&self, target_id: &TargetId) -> Result<DbFlow> {
        let sql = format!(
            "SELECT f.id, f.status, fv.display_name, fv.trigger_tree \
             FROM flow f \
             JOIN flow_version fv ON fv.flow_id = f.id \
             WHERE f.id = {} \
               AND fv.created = (SELECT MAX(created) FROM flow_version WHERE flow_id = f.id)",
            self.m(1)
        );
        let row = sqlx::query(&sql)
            .bind(&target_id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SyncError::FlowNotFound(target_id.clone()))?;
        Self::row_to_flow(&row)
    }

    async fn create(&self, project_id: &ProjectId, definition: &FlowDefinition) -> Result<DbFlow> {
        let flow_id = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO flow (id, project_id, status) VALUES ({}, {}, {})",
            self.m(1),
            self.m(2),
            self.m(3)
        );
        sqlx::query(&sql)
            .bind(&flow_id)
            .bind(&project_id.0)
            .bind("DISABLED")
            .execute(&self.pool)
            .await?;
        self.insert_version(&flow_id, definition).await?;
        Ok(DbFlow {
            target_id: TargetId(flow_id),
            definition: definition.clone(),
            status: FlowStatus::Disabled,
        })
    }

    async fn update(&self, target_id: &TargetId, definition: &FlowDefinition) -> Result<DbFlow> {
        // Existence check first so an unknown id maps to the typed error.
        let current = self.get_one_populated(target_id).await?;
        self.insert_version(&target_id.0, definition).await?;
        Ok(DbFlow {
            target_id: target_id.clone(),
            definition: definition.clone(),
            status: current.status,
        })
    }

    async fn delete(&self, target_id: &TargetId) -> Result<()> {
        let sql = format!("DELETE FROM flow_version WHERE flow_id = {}", self.m(1));
        sqlx::query(&sql)
            .bind(&target_id.0)
            .execute(&self.pool)
            .await?;
        let sql = format!("DELETE FROM flow WHERE id = {}", self.m(1));
        sqlx::query(&sql)
            .bind(&target_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lock_and_publish(&self, target_id: &TargetId) -> Result<()> {
        let sql = format!(
            "UPDATE flow_version SET locked = {} \
             WHERE flow_id = {} \
               AND created = (SELECT MAX(created) FROM flow_version fv2 WHERE fv2.flow_id = {})",
            self.m(1),
            self.m(2),
            self.m(3)
        );
        let result = sqlx::query(&sql)
            .bind(true)
            .bind(&target_id.0)
            .bind(&target_id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SyncError::FlowNotFound(target_id.clone()));
        }

        let sql = format!(
            "UPDATE flow SET published_version_id = \
               (SELECT id FROM flow_version WHERE flow_id = {} \
                  AND created = (SELECT MAX(created) FROM flow_version fv2 WHERE fv2.flow_id = {})) \
             WHERE id = {}",
            self.m(1),
            self.m(2),
            self.m(3)
        );
        sqlx::query(&sql)
            .bind(&target_id.0)
            .bind(&target_id.0)
            .bind(&target_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
