use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::flow::{DbFlow, GitFlow};
use crate::domain::value_objects::Fingerprint;

// ─── Sync operations ─────────────────────────────────────────────────────────

/// One structural operation the diff engine decided on.
///
/// Operations are data, not commands: the plan can be returned to a caller
/// for dry-run review before anything is executed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum SyncOperation {
    /// Git flow with no database counterpart — create a record for it.
    Create { git_flow: GitFlow },
    /// Mapped pair whose content diverged — overwrite the db side.
    Update { git_flow: GitFlow, target_flow: DbFlow },
    /// Db flow with no surviving git counterpart — delete the record.
    Delete { target_flow: DbFlow },
}

impl SyncOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOperation::Create { .. } => "CREATE",
            SyncOperation::Update { .. } => "UPDATE",
            SyncOperation::Delete { .. } => "DELETE",
        }
    }

    /// Display name of the flow this operation is about, for reporting.
    pub fn display_name(&self) -> &str {
        match self {
            SyncOperation::Create { git_flow } | SyncOperation::Update { git_flow, .. } => {
                &git_flow.definition.display_name
            }
            SyncOperation::Delete { target_flow } => &target_flow.definition.display_name,
        }
    }
}

// ─── Per-flow sync errors ────────────────────────────────────────────────────

/// A non-fatal, per-flow failure collected during a pull.
///
/// One broken flow must not block synchronization of the rest of the
/// project, so republish failures become data attached to the report
/// instead of aborting the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSyncError {
    pub flow_id: String,
    pub message: String,
}

// ─── Plan + report ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub total: usize,
}

/// The ordered operation list produced by one diff, plus identifying
/// metadata. Deletes come first, then creates, then updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    pub plan_id: String,
    pub created_at: String,
    /// Fingerprint of the git snapshot set the plan was computed from.
    pub source_fingerprint: Fingerprint,
    /// Fingerprint of the db snapshot set the plan was computed from.
    pub target_fingerprint: Fingerprint,
    pub operations: Vec<SyncOperation>,
    pub summary: Summary,
}

impl SyncPlan {
    pub fn new(
        operations: Vec<SyncOperation>,
        source_fingerprint: Fingerprint,
        target_fingerprint: Fingerprint,
    ) -> Self {
        let creates = operations
            .iter()
            .filter(|op| matches!(op, SyncOperation::Create { .. }))
            .count();
        let updates = operations
            .iter()
            .filter(|op| matches!(op, SyncOperation::Update { .. }))
            .count();
        let deletes = operations
            .iter()
            .filter(|op| matches!(op, SyncOperation::Delete { .. }))
            .count();

        SyncPlan {
            plan_id: format!(
                "plan_{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                Uuid::new_v4().simple()
            ),
            created_at: Utc::now().to_rfc3339(),
            source_fingerprint,
            target_fingerprint,
            operations,
            summary: Summary {
                creates,
                updates,
                deletes,
                total: creates + updates + deletes,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Result of one pull: the plan that was computed, whether it was applied,
/// and any per-flow errors collected while applying it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub plan: SyncPlan,
    pub dry_run: bool,
    pub errors: Vec<ProjectSyncError>,
}
