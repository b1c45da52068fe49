use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::flow::{DbFlow, GitFlow};
use crate::domain::value_objects::{SourceId, TargetId};

// ─── Mapping state ───────────────────────────────────────────────────────────

/// One correlation entry: which git-side source id a database flow maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMapping {
    pub source_id: SourceId,
}

/// Persistent bidirectional correlation table between git-side source ids
/// and database-assigned target ids.
///
/// Keyed by target id; 1:1 by construction — `map_flow` upserts by target,
/// and a source id is only ever introduced by the single push/pull that owns
/// it. Persisted as an opaque JSON blob on the repository-configuration
/// record; the sync orchestrator is the only writer.
///
/// All operations are total pure functions returning a new state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingState {
    #[serde(default)]
    pub flows: BTreeMap<TargetId, FlowMapping>,
}

impl MappingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward lookup: the source id mapped to `target_id`, if any.
    pub fn find_source_id(&self, target_id: &TargetId) -> Option<&SourceId> {
        self.flows.get(target_id).map(|m| &m.source_id)
    }

    /// Reverse lookup: the target id whose entry carries `source_id`.
    ///
    /// Linear scan over current entries — O(n), acceptable because flow
    /// counts per project are small. A larger deployment would add a
    /// secondary index alongside the forward map, not change this contract.
    pub fn find_target_id(&self, source_id: &SourceId) -> Option<&TargetId> {
        self.flows
            .iter()
            .find(|(_, m)| &m.source_id == source_id)
            .map(|(t, _)| t)
    }

    /// Upsert the entry for `target_id`, overwriting any previous source id
    /// recorded for that target.
    pub fn map_flow(mut self, source_id: SourceId, target_id: TargetId) -> Self {
        self.flows.insert(target_id, FlowMapping { source_id });
        self
    }

    /// Drop the entry for `target_id`. Removing an absent entry is a no-op.
    pub fn delete_flow(mut self, target_id: &TargetId) -> Self {
        self.flows.remove(target_id);
        self
    }

    /// Restrict the state to entries where both sides still exist.
    ///
    /// Must run before every diff: a dangling entry (file deleted from git,
    /// or record deleted from the db) would make a real rename look like a
    /// create+delete pair.
    pub fn clean(mut self, git_flows: &[GitFlow], db_flows: &[DbFlow]) -> Self {
        self.flows.retain(|target_id, m| {
            let source_alive = git_flows.iter().any(|f| f.source_id == m.source_id);
            let target_alive = db_flows.iter().any(|f| &f.target_id == target_id);
            source_alive && target_alive
        });
        self
    }

    /// Swap source/target roles, for reading the table in the opposite
    /// direction (a git-initiated sync walks target→source, a db-initiated
    /// sync walks source→target).
    pub fn reverse(self) -> Self {
        let flows = self
            .flows
            .into_iter()
            .map(|(target_id, m)| {
                (
                    TargetId(m.source_id.0),
                    FlowMapping {
                        source_id: SourceId(target_id.0),
                    },
                )
            })
            .collect();
        Self { flows }
    }
}
