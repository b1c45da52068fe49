use async_trait::async_trait;

use crate::domain::error::Result;
use crate::domain::flow::{DbFlow, FlowDefinition, GitFlow};
use crate::domain::mapping::MappingState;
use crate::domain::plan::SyncOperation;
use crate::domain::repo::RepositoryConfig;
use crate::domain::value_objects::{ProjectId, RepoId, SourceId, TargetId};

/// Port: the project's flow CRUD service (implemented by SqlxFlowRepository).
///
/// The sync engine treats flow execution and versioning as someone else's
/// problem; this is the full surface it consumes.
#[async_trait]
pub trait FlowRecordRepository: Send + Sync {
    /// All flow records for a project, each populated with its current
    /// version's trigger subtree, ordered by id for deterministic diffs.
    async fn list_for_project(&self, project_id: &ProjectId) -> Result<Vec<DbFlow>>;

    async fn get_one_populated(&self, target_id: &TargetId) -> Result<DbFlow>;

    /// Create a new flow record from a git definition; the store assigns
    /// the target id.
    async fn create(&self, project_id: &ProjectId, definition: &FlowDefinition) -> Result<DbFlow>;

    /// Overwrite a flow's display name and trigger subtree with the git
    /// definition, as a new version.
    async fn update(&self, target_id: &TargetId, definition: &FlowDefinition) -> Result<DbFlow>;

    async fn delete(&self, target_id: &TargetId) -> Result<()>;

    /// Lock and publish the flow's latest version, so the enabled version
    /// reflects the synced content.
    async fn lock_and_publish(&self, target_id: &TargetId) -> Result<()>;
}

/// Port: persistence of repository configurations and their mapping blobs
/// (implemented by SqlxRepoConfigStore).
#[async_trait]
pub trait RepoConfigStore: Send + Sync {
    async fn get(&self, id: &RepoId) -> Result<RepositoryConfig>;

    async fn list_for_project(&self, project_id: &ProjectId) -> Result<Vec<RepositoryConfig>>;

    /// Insert or replace the single config for `config.project_id`.
    async fn upsert(&self, config: RepositoryConfig) -> Result<RepositoryConfig>;

    async fn delete(&self, id: &RepoId) -> Result<()>;

    /// Persist a new mapping blob for an existing config.
    async fn save_mapping(&self, id: &RepoId, mapping: &MappingState) -> Result<()>;
}

/// Port: a materialized per-project git working tree
/// (implemented by GitWorkspaceManager; faked in orchestrator tests).
///
/// `prepare` must run before any other call for the same sync attempt; it
/// re-clones from the remote so the tree is a fresh, consistent snapshot.
#[async_trait]
pub trait SyncWorkspace: Send + Sync {
    /// Recreate the per-project workspace from scratch and pull the branch.
    async fn prepare(&self, config: &RepositoryConfig) -> Result<()>;

    /// Read every flow file in the workspace, sorted by source id.
    /// Rejects empty and duplicate source identifiers.
    async fn read_flows(&self, config: &RepositoryConfig) -> Result<Vec<GitFlow>>;

    async fn write_flow(&self, config: &RepositoryConfig, flow: &GitFlow) -> Result<()>;

    async fn delete_flow(&self, config: &RepositoryConfig, source_id: &SourceId) -> Result<()>;

    /// Snapshot the mapping into `state/<projectId>.json` so the
    /// correlation table is visible in git history.
    async fn write_state(&self, config: &RepositoryConfig, mapping: &MappingState) -> Result<()>;

    /// Stage everything and push. A tree with no staged changes is a no-op,
    /// not an error.
    async fn commit_and_push(&self, config: &RepositoryConfig, message: &str) -> Result<()>;

    /// Discard the workspace and any provisioned credentials. Runs on every
    /// exit path of a sync attempt, including failures.
    async fn cleanup(&self, config: &RepositoryConfig) -> Result<()> {
        let _ = config;
        Ok(())
    }
}

/// Port: the diff algorithm (implemented by FlowPlanner).
pub trait Planner: Send + Sync {
    /// Compute the ordered operation list for one pull: deletes, then
    /// creates, then updates.
    fn plan(
        &self,
        git_flows: &[GitFlow],
        db_flows: &[DbFlow],
        mapping: &MappingState,
    ) -> Vec<SyncOperation>;
}
