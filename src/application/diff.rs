use crate::domain::{
    flow::{DbFlow, GitFlow},
    mapping::MappingState,
    plan::SyncOperation,
    ports::Planner,
};

// ─── Flow Planner (implementation of the port) ───────────────────────────────

/// Pure diff engine: turns a (git snapshot, db snapshot, mapping) triple
/// into the ordered operation list for one pull.
///
/// Operations are emitted in a fixed order — deletes, then creates, then
/// updates — so a source id whose target was deleted and re-created in the
/// same pull never collides with its own stale record.
///
/// The caller must [`MappingState::clean`] the mapping first; a dangling
/// entry would make a rename look like a create+delete pair.
#[derive(Default)]
pub struct FlowPlanner;

impl FlowPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl Planner for FlowPlanner {
    fn plan(
        &self,
        git_flows: &[GitFlow],
        db_flows: &[DbFlow],
        mapping: &MappingState,
    ) -> Vec<SyncOperation> {
        let mut operations = Vec::new();

        // 1. Deletes: db flows with no mapping entry, or whose mapped source
        //    id no longer has a file in git.
        for db_flow in db_flows {
            let orphaned = match mapping.find_source_id(&db_flow.target_id) {
                None => true,
                Some(source_id) => !git_flows.iter().any(|f| &f.source_id == source_id),
            };
            if orphaned {
                operations.push(SyncOperation::Delete {
                    target_flow: db_flow.clone(),
                });
            }
        }

        // 2. Creates: git flows with no mapping entry, or whose mapped target
        //    id no longer has a record in the db.
        for git_flow in git_flows {
            let unborn = match mapping.find_target_id(&git_flow.source_id) {
                None => true,
                Some(target_id) => !db_flows.iter().any(|f| &f.target_id == target_id),
            };
            if unborn {
                operations.push(SyncOperation::Create {
                    git_flow: git_flow.clone(),
                });
            }
        }

        // 3. Updates: mapped pairs whose content diverged. Unchanged pairs
        //    are skipped, so a no-op round-trip produces an empty plan.
        for git_flow in git_flows {
            let Some(target_id) = mapping.find_target_id(&git_flow.source_id) else {
                continue;
            };
            let Some(db_flow) = db_flows.iter().find(|f| &f.target_id == target_id) else {
                continue;
            };
            if !git_flow.definition.sync_eq(&db_flow.definition) {
                operations.push(SyncOperation::Update {
                    git_flow: git_flow.clone(),
                    target_flow: db_flow.clone(),
                });
            }
        }

        operations
    }
}
