use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::{SourceId, TargetId};

// ─── Flow snapshots ──────────────────────────────────────────────────────────

/// Publish state of a database flow record.
///
/// `Enabled` flows are republished (lock + publish of the latest version)
/// after a pull creates or updates them, so the production-enabled version
/// reflects the synced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Enabled,
    Disabled,
}

/// The comparable payload of a flow: display name plus the trigger subtree,
/// which transitively contains every step of the flow.
///
/// Timestamps and other store-internal metadata are deliberately absent —
/// the sync engine is content-aware, not timestamp-aware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub display_name: String,
    pub trigger: Value,
}

impl FlowDefinition {
    /// Sync-equality rule: two definitions are equal iff the display name
    /// matches and the trigger subtrees are structurally equal after
    /// canonical normalization (object key order never matters).
    pub fn sync_eq(&self, other: &FlowDefinition) -> bool {
        self.display_name == other.display_name
            && normalize_json(&self.trigger) == normalize_json(&other.trigger)
    }
}

/// A flow as read from the git working tree. The id is the base filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitFlow {
    pub source_id: SourceId,
    pub definition: FlowDefinition,
}

/// A flow record as read from the database, populated with its current
/// version so it is structurally comparable to a [`GitFlow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbFlow {
    pub target_id: TargetId,
    pub definition: FlowDefinition,
    pub status: FlowStatus,
}

// ─── Canonical JSON ──────────────────────────────────────────────────────────

/// Recursively sort object keys so structural comparison ignores key order.
pub fn normalize_json(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| *k);
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), normalize_json(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(normalize_json).collect()),
        _ => v.clone(),
    }
}
