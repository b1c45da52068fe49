use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::locks::ProjectLocks;
use crate::domain::{
    error::Result,
    flow::GitFlow,
    ports::{FlowRecordRepository, RepoConfigStore, SyncWorkspace},
    repo::RepositoryConfig,
    value_objects::{RepoId, SourceId, TargetId},
};

// ─── Push Service ────────────────────────────────────────────────────────────

/// Push orchestrator: the database is the source of truth, git records it.
///
/// A push handles exactly one flow. Any step failing aborts the whole
/// attempt; the mapping blob is persisted to the config store only after
/// the git push succeeded, so a failed push never leaves the mapping
/// pointing at a file the remote never saw.
pub struct PushService {
    repos: Arc<dyn RepoConfigStore>,
    flows: Arc<dyn FlowRecordRepository>,
    workspace: Arc<dyn SyncWorkspace>,
    locks: ProjectLocks,
}

impl PushService {
    pub fn new(
        repos: Arc<dyn RepoConfigStore>,
        flows: Arc<dyn FlowRecordRepository>,
        workspace: Arc<dyn SyncWorkspace>,
        locks: ProjectLocks,
    ) -> Self {
        Self {
            repos,
            flows,
            workspace,
            locks,
        }
    }

    /// Write the flow's current definition into the repository and push.
    #[instrument(skip(self, message), fields(repo = %repo_id, flow = %flow_id))]
    pub async fn push_flow(
        &self,
        repo_id: &RepoId,
        flow_id: &TargetId,
        message: Option<&str>,
    ) -> Result<()> {
        let config = self.repos.get(repo_id).await?;
        let lock = self.locks.for_project(&config.project_id);
        let _guard = lock.lock().await;

        let result = self.write_and_push(repo_id, &config, flow_id, message).await;
        if let Err(err) = self.workspace.cleanup(&config).await {
            warn!(%err, "workspace cleanup failed");
        }
        result
    }

    async fn write_and_push(
        &self,
        repo_id: &RepoId,
        config: &RepositoryConfig,
        flow_id: &TargetId,
        message: Option<&str>,
    ) -> Result<()> {
        let flow = self.flows.get_one_populated(flow_id).await?;

        // An unmapped flow gets its own id as its first source identifier;
        // every later push reuses the mapped one, so db-side renames never
        // move the file.
        let source_id = config
            .mapping
            .find_source_id(flow_id)
            .cloned()
            .unwrap_or_else(|| SourceId(flow_id.0.clone()));

        self.workspace.prepare(config).await?;
        let git_flow = GitFlow {
            source_id: source_id.clone(),
            definition: flow.definition,
        };
        self.workspace.write_flow(config, &git_flow).await?;

        let mapping = config
            .mapping
            .clone()
            .map_flow(source_id.clone(), flow_id.clone());
        self.workspace.write_state(config, &mapping).await?;

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("chore: updated flow {source_id}"));
        self.workspace.commit_and_push(config, &message).await?;

        self.repos.save_mapping(repo_id, &mapping).await?;
        info!(%source_id, "pushed flow");
        Ok(())
    }

    /// Remove the flow's file from the repository and push.
    #[instrument(skip(self, message), fields(repo = %repo_id, flow = %flow_id))]
    pub async fn delete_flow(
        &self,
        repo_id: &RepoId,
        flow_id: &TargetId,
        message: Option<&str>,
    ) -> Result<()> {
        let config = self.repos.get(repo_id).await?;
        let lock = self.locks.for_project(&config.project_id);
        let _guard = lock.lock().await;

        let result = self.remove_and_push(repo_id, &config, flow_id, message).await;
        if let Err(err) = self.workspace.cleanup(&config).await {
            warn!(%err, "workspace cleanup failed");
        }
        result
    }

    async fn remove_and_push(
        &self,
        repo_id: &RepoId,
        config: &RepositoryConfig,
        flow_id: &TargetId,
        message: Option<&str>,
    ) -> Result<()> {
        let source_id = config
            .mapping
            .find_source_id(flow_id)
            .cloned()
            .unwrap_or_else(|| SourceId(flow_id.0.clone()));

        self.workspace.prepare(config).await?;
        let mapping = config.mapping.clone().delete_flow(flow_id);
        self.workspace.delete_flow(config, &source_id).await?;
        self.workspace.write_state(config, &mapping).await?;

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("chore: deleted flow {source_id}"));
        self.workspace.commit_and_push(config, &message).await?;

        self.repos.save_mapping(repo_id, &mapping).await?;
        info!(%source_id, "deleted flow from repository");
        Ok(())
    }
}
