use serde::Serialize;

use crate::domain::plan::{ProjectSyncError, PullReport, SyncOperation};

// ─── Pull response view ──────────────────────────────────────────────────────

/// The caller-facing shape of a pull response: each operation names the
/// flow it is about and, for updates, the database flow it targets. The
/// full [`PullReport`] (fingerprints, summary, plan metadata) stays
/// internal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullView {
    pub operations: Vec<OperationView>,
    pub errors: Vec<ProjectSyncError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub flow: FlowRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_flow: Option<FlowRef>,
}

/// Minimal flow reference: git flows carry their source id, database
/// flows their target id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRef {
    pub id: String,
    pub display_name: String,
}

impl From<&PullReport> for PullView {
    fn from(report: &PullReport) -> Self {
        let operations = report
            .plan
            .operations
            .iter()
            .map(|op| match op {
                SyncOperation::Create { git_flow } => OperationView {
                    kind: op.kind(),
                    flow: FlowRef {
                        id: git_flow.source_id.0.clone(),
                        display_name: git_flow.definition.display_name.clone(),
                    },
                    target_flow: None,
                },
                SyncOperation::Update {
                    git_flow,
                    target_flow,
                } => OperationView {
                    kind: op.kind(),
                    flow: FlowRef {
                        id: git_flow.source_id.0.clone(),
                        display_name: git_flow.definition.display_name.clone(),
                    },
                    target_flow: Some(FlowRef {
                        id: target_flow.target_id.0.clone(),
                        display_name: target_flow.definition.display_name.clone(),
                    }),
                },
                SyncOperation::Delete { target_flow } => OperationView {
                    kind: op.kind(),
                    flow: FlowRef {
                        id: target_flow.target_id.0.clone(),
                        display_name: target_flow.definition.display_name.clone(),
                    },
                    target_flow: None,
                },
            })
            .collect();
        PullView {
            operations,
            errors: report.errors.clone(),
        }
    }
}
